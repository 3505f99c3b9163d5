//! A WireGuard VPN: one server, its client peers and the connection metadata
use crate::encryption::Key;
use crate::error::{Error, Result};
use crate::ini::ConfigFile;
use crate::metadata::Metadata;
use crate::network::{is_allocatable, iterate, NetSlice};
use crate::node::{ClientAsPeer, Server, INTERFACE_SECTION, PEER_SECTION};
use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;
use tracing::{debug, info};

/// Connection name of a server file: its file name without extension
pub fn connection_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub struct Vpn {
    name: String,
    server: Server,
    peers: Vec<ClientAsPeer>,
    metadata: Option<Metadata>,
}

impl Vpn {
    /// A fresh VPN with no clients
    pub fn new(name: impl Into<String>, server: Server) -> Self {
        Vpn {
            name: name.into(),
            server,
            peers: Vec::new(),
            metadata: None,
        }
    }

    /// Load a server configuration file.
    ///
    /// Exactly one `[Interface]` section is expected; every `[Peer]` section
    /// must be valid. Other sections are ignored.
    pub fn read(path: &Path) -> Result<Self> {
        let file = ConfigFile::parse(path)?;
        let mut server = None;
        let mut peers = Vec::new();

        for section in file.sections() {
            match section.name() {
                INTERFACE_SECTION => {
                    if server.is_some() {
                        return Err(Error::DuplicateInterface {
                            path: path.to_path_buf(),
                        });
                    }
                    server = Some(Server::from_section(section)?);
                }
                PEER_SECTION => peers.push(ClientAsPeer::from_section(section)?),
                other => debug!("Skipping section [{}]", other),
            }
        }

        let server = server.ok_or_else(|| Error::MissingInterface {
            path: path.to_path_buf(),
        })?;
        debug!("Read {} with {} peers", path.display(), peers.len());
        Ok(Vpn {
            name: connection_name(path),
            server,
            peers,
            metadata: None,
        })
    }

    /// Attach the metadata stored for this connection in the shared file
    pub fn add_metadata(&mut self, path: &Path) -> Result<()> {
        self.metadata = Some(Metadata::load(&self.name, path)?);
        Ok(())
    }

    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = Some(metadata);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn peers(&self) -> &[ClientAsPeer] {
        &self.peers
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    pub fn number_of_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn add_peer(&mut self, peer: ClientAsPeer) {
        self.peers.push(peer);
    }

    /// Base64 public keys of the clients, in file order
    pub fn peer_public_keys(&self) -> Vec<String> {
        self.peers.iter().map(|p| p.peer().public_key().base64()).collect()
    }

    /// Remove the client with the given public key
    pub fn remove_peer_from_public_key(&mut self, key: &Key) -> Result<()> {
        let index = self
            .peers
            .iter()
            .position(|p| p.peer().public_key() == key)
            .ok_or_else(|| Error::PeerNotFound(key.base64()))?;
        self.peers.remove(index);
        info!("Removed peer {} from {}", key.base64(), self.name);
        Ok(())
    }

    /// Every address already in use by the server or a client
    pub fn reserved_ips(&self) -> HashSet<IpAddr> {
        self.server
            .node()
            .address()
            .addresses()
            .chain(self.peers.iter().flat_map(|p| p.peer().allowed_ips().addresses()))
            .collect()
    }

    /// Allocate an address for a new client: in each declared network, the
    /// first allocatable address not used by the server or any client.
    pub fn provide_net_slice(&self) -> Result<NetSlice> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| Error::MissingMetadata(self.name.clone()))?;
        let reserved = self.reserved_ips();
        let mut out = NetSlice::new();

        for network in metadata.networks() {
            let ip = iterate(network)
                .find(|ip| is_allocatable(network, *ip) && !reserved.contains(ip))
                .ok_or_else(|| Error::NoAddressAvailable(network.to_string()))?;
            let net = IpNet::new(ip, network.prefix_len())
                .map_err(|_| Error::NoAddressAvailable(network.to_string()))?;
            debug!("Allocated {} in {}", net, network);
            out.append(net);
        }
        Ok(out)
    }

    /// Rewrite the server file: `[Interface]` then one `[Peer]` per client
    pub fn to_config(&self) -> Result<ConfigFile> {
        let mut file = ConfigFile::new();
        file.push_section(self.server.to_section()?);
        for peer in &self.peers {
            file.push_section(peer.to_section()?);
        }
        Ok(file)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.to_config()?.save(path)?;
        info!("Saved {} ({} peers) to {}", self.name, self.peers.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Client;
    use std::fs;

    fn vpn_with_network(server: &str, network: &str) -> Vpn {
        let server = Server::new(&server.parse().unwrap(), 12000);
        let mut vpn = Vpn::new("wg0", server);
        vpn.set_metadata(Metadata::new("wg.example.org", network.parse().unwrap(), Vec::new()));
        vpn
    }

    fn add_client(vpn: &mut Vpn) -> Result<Client> {
        let address = vpn.provide_net_slice()?;
        let client = Client::new(&address, true, Vec::new());
        vpn.add_peer(client.to_peer());
        Ok(client)
    }

    #[test]
    fn test_connection_name() {
        assert_eq!(connection_name(Path::new("/etc/wireguard/wg0.conf")), "wg0");
        assert_eq!(connection_name(Path::new("wg1")), "wg1");
    }

    #[test]
    fn test_allocation_is_disjoint() {
        let mut vpn = vpn_with_network("10.0.0.1/24", "10.0.0.0/24");
        for _ in 0..20 {
            add_client(&mut vpn).unwrap();
        }
        let mut all: Vec<IpAddr> = vpn.server().node().address().addresses().collect();
        for peer in vpn.peers() {
            all.extend(peer.peer().allowed_ips().addresses());
        }
        assert_eq!(all.len(), 21);
        let unique: HashSet<IpAddr> = all.iter().copied().collect();
        assert_eq!(unique.len(), 21);
        let network: IpAddr = "10.0.0.0".parse().unwrap();
        assert!(all.iter().all(|ip| *ip != network && !ip.is_multicast()));
    }

    #[test]
    fn test_allocation_order_and_prefix() {
        let mut vpn = vpn_with_network("10.0.10.1/24, fd00::1/64", "10.0.10.1/24, fd00::1/64");
        let first = vpn.provide_net_slice().unwrap();
        assert_eq!(first.to_string(), "10.0.10.2/24, fd00::2/64");
        add_client(&mut vpn).unwrap();
        assert_eq!(vpn.provide_net_slice().unwrap().to_string(), "10.0.10.3/24, fd00::3/64");
    }

    #[test]
    fn test_allocation_reuses_removed_address() {
        let mut vpn = vpn_with_network("10.0.0.1/24", "10.0.0.0/24");
        let first = add_client(&mut vpn).unwrap();
        add_client(&mut vpn).unwrap();
        vpn.remove_peer_from_public_key(&first.node().public_key()).unwrap();
        assert_eq!(vpn.provide_net_slice().unwrap().to_string(), "10.0.0.2/24");
    }

    #[test]
    fn test_allocation_exhaustion() {
        // 10.0.0.0 is the network, 10.0.0.1 the server
        let mut vpn = vpn_with_network("10.0.0.1/29", "10.0.0.0/29");
        for _ in 0..6 {
            add_client(&mut vpn).unwrap();
        }
        assert!(matches!(
            vpn.provide_net_slice(),
            Err(Error::NoAddressAvailable(_))
        ));
    }

    #[test]
    fn test_allocation_needs_metadata() {
        let vpn = Vpn::new("wg0", Server::new(&"10.0.0.1/24".parse().unwrap(), 1));
        assert!(matches!(vpn.provide_net_slice(), Err(Error::MissingMetadata(_))));
    }

    #[test]
    fn test_remove_unknown_peer() {
        let mut vpn = vpn_with_network("10.0.0.1/24", "10.0.0.0/24");
        add_client(&mut vpn).unwrap();
        assert!(matches!(
            vpn.remove_peer_from_public_key(&Key::random()),
            Err(Error::PeerNotFound(_))
        ));
        assert_eq!(vpn.number_of_peers(), 1);
    }

    #[test]
    fn test_save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wg0.conf");
        let mut vpn = vpn_with_network("10.0.0.1/24", "10.0.0.0/24");
        let clients: Vec<Client> = (0..3).map(|_| add_client(&mut vpn).unwrap()).collect();
        vpn.save(&path).unwrap();

        let mut loaded = Vpn::read(&path).unwrap();
        assert_eq!(loaded.name(), "wg0");
        assert_eq!(loaded.server(), vpn.server());
        assert_eq!(loaded.peers(), vpn.peers());
        assert_eq!(loaded.peer_public_keys(), vpn.peer_public_keys());

        let removed = clients[1].node().public_key();
        loaded.remove_peer_from_public_key(&removed).unwrap();
        loaded.save(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("[Peer]").count(), 2);
        assert!(!text.contains(&removed.base64()));
        assert_eq!(fs::read_to_string(&path).unwrap(), loaded.to_config().unwrap().to_string());
    }

    #[test]
    fn test_read_rejects_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("no_interface.conf", "[Peer]\nPublicKey = IYIgnBITiOdCJUyg/c0jpPi0+OWVhcWw/CS5FIpG024=\nAllowedIPs = 10.0.0.2/32\n"),
            ("bad_keys.conf", "[Interface]\nAddress = 10.0.0.1/24\nPrivateKey = abc!\nListenPort = 1\n"),
            ("bad_peer.conf", "[Interface]\nAddress = 10.0.0.1/24\nPrivateKey = wDx8ruBJgk2ZmDwgHkZfnoaSdfCgXUb4MwJ87psOJGE=\nListenPort = 1\n[Peer]\nAllowedIPs = 10.0.0.2/32\n"),
            ("two_interfaces.conf", "[Interface]\nAddress = 10.0.0.1/24\nPrivateKey = wDx8ruBJgk2ZmDwgHkZfnoaSdfCgXUb4MwJ87psOJGE=\nListenPort = 1\n[Interface]\nAddress = 10.0.0.1/24\nPrivateKey = wDx8ruBJgk2ZmDwgHkZfnoaSdfCgXUb4MwJ87psOJGE=\nListenPort = 1\n"),
        ];
        for (name, content) in cases {
            let path = dir.path().join(name);
            fs::write(&path, content).unwrap();
            assert!(Vpn::read(&path).is_err(), "{} should fail", name);
        }
    }

    #[test]
    fn test_read_ignores_unknown_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wg0.conf");
        fs::write(
            &path,
            "[Interface]\nAddress = 10.0.0.1/24\nPrivateKey = wDx8ruBJgk2ZmDwgHkZfnoaSdfCgXUb4MwJ87psOJGE=\nListenPort = 51820\n\n[Extra]\nFoo = bar\n",
        )
        .unwrap();
        let vpn = Vpn::read(&path).unwrap();
        assert_eq!(vpn.number_of_peers(), 0);
        assert_eq!(vpn.server().listen_port(), 51820);
    }
}
