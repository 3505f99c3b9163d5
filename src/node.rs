//! VPN nodes (server and clients) and their peer-facing projections
//!
//! A node owns a private key; a peer is what another node sees of it: the
//! derived public key, the host routes of its addresses and the optional
//! pre-shared key.
use crate::encryption::{Key, PresharedKey};
use crate::error::{Error, Result};
use crate::ini::{format_ip_list, ConfigFile, Section};
use crate::network::{ipv4_zero_net, ipv6_zero_net, NetSlice};
use std::fmt;
use std::net::IpAddr;

pub const INTERFACE_SECTION: &str = "Interface";
pub const PEER_SECTION: &str = "Peer";

/// Common part of a server or client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    address: NetSlice,
    private_key: Key,
    psk: Option<PresharedKey>,
}

impl Node {
    /// Create a node with a fresh private key (and pre-shared key if asked)
    pub fn new(address: &NetSlice, with_psk: bool) -> Self {
        Node {
            address: address.clone(),
            private_key: Key::random(),
            psk: with_psk.then(PresharedKey::random),
        }
    }

    pub fn from_parts(address: NetSlice, private_key: Key, psk: Option<PresharedKey>) -> Self {
        Node {
            address,
            private_key,
            psk,
        }
    }

    pub fn address(&self) -> &NetSlice {
        &self.address
    }

    pub fn private_key(&self) -> &Key {
        &self.private_key
    }

    pub fn public_key(&self) -> Key {
        self.private_key.public()
    }

    pub fn psk(&self) -> Option<&PresharedKey> {
        self.psk.as_ref()
    }

    pub fn private_base64(&self) -> String {
        self.private_key.base64()
    }

    pub fn public_base64(&self) -> String {
        self.public_key().base64()
    }

    pub fn psk_base64(&self) -> Option<String> {
        self.psk.as_ref().map(PresharedKey::base64)
    }

    fn write_section(&self, section: &mut Section) -> Result<()> {
        section.set("Address", self.address.to_string())?;
        section.set("PrivateKey", self.private_key.base64())?;
        Ok(())
    }

    fn read_section(section: &Section) -> Result<(NetSlice, Key)> {
        Ok((
            section.get_net_slice("Address")?,
            section.get_key_from_base64("PrivateKey")?,
        ))
    }

    /// How other nodes see this one
    pub fn to_peer(&self) -> Peer {
        Peer {
            allowed_ips: self.address.to_host_routes(),
            public_key: self.public_key(),
            psk: self.psk,
        }
    }
}

/// The node listening for clients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Server {
    node: Node,
    listen_port: u16,
}

impl Server {
    /// New server with a random private key. Pre-shared keys belong to
    /// client/server pairs, so the server itself never carries one.
    pub fn new(address: &NetSlice, listen_port: u16) -> Self {
        Server {
            node: Node::new(address, false),
            listen_port,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Read an `[Interface]` section of a server file
    pub fn from_section(section: &Section) -> Result<Self> {
        let read = || -> Result<Self> {
            let (address, private_key) = Node::read_section(section)?;
            let listen_port = section.get_int("ListenPort")?;
            Ok(Server {
                node: Node::from_parts(address, private_key, None),
                listen_port,
            })
        };
        read().map_err(|e| Error::InvalidServer(Box::new(e)))
    }

    pub fn to_section(&self) -> Result<Section> {
        let mut section = Section::new(INTERFACE_SECTION);
        self.node.write_section(&mut section)?;
        section.set("ListenPort", self.listen_port.to_string())?;
        Ok(section)
    }

    /// The server as seen by a client. `routes` are the destinations sent
    /// through the tunnel, everything when `None`.
    pub fn to_peer(&self, routes: Option<&NetSlice>, endpoint: &str) -> ServerAsPeer {
        let mut peer = self.node.to_peer();
        peer.allowed_ips = match routes {
            Some(routes) => routes.clone(),
            None => NetSlice::from(vec![ipv4_zero_net(), ipv6_zero_net()]),
        };
        ServerAsPeer {
            peer,
            endpoint: format!("{}:{}", endpoint, self.listen_port),
        }
    }
}

/// A node reaching the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    node: Node,
    dns: Vec<IpAddr>,
}

impl Client {
    pub fn new(address: &NetSlice, with_psk: bool, dns: Vec<IpAddr>) -> Self {
        Client {
            node: Node::new(address, with_psk),
            dns,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn dns(&self) -> &[IpAddr] {
        &self.dns
    }

    /// Read the `[Interface]` section of a client file. The pre-shared key
    /// lives in the `[Peer]` section and is not recovered here.
    pub fn from_section(section: &Section) -> Result<Self> {
        let (address, private_key) = Node::read_section(section)?;
        let dns = if section.has_key("DNS") {
            section.get_ip_array("DNS")?
        } else {
            Vec::new()
        };
        Ok(Client {
            node: Node::from_parts(address, private_key, None),
            dns,
        })
    }

    pub fn to_section(&self) -> Result<Section> {
        let mut section = Section::new(INTERFACE_SECTION);
        self.node.write_section(&mut section)?;
        if !self.dns.is_empty() {
            section.set("DNS", format_ip_list(&self.dns))?;
        }
        Ok(section)
    }

    pub fn to_peer(&self) -> ClientAsPeer {
        ClientAsPeer {
            peer: self.node.to_peer(),
        }
    }

    /// Full client configuration: its interface plus the server as its only
    /// peer, sharing the client's pre-shared key
    pub fn to_config(&self, server: &Server, routes: Option<&NetSlice>, endpoint: &str) -> Result<ConfigFile> {
        let mut server_peer = server.to_peer(routes, endpoint);
        server_peer.peer.psk = self.node.psk;

        let mut file = ConfigFile::new();
        file.push_section(self.to_section()?);
        file.push_section(server_peer.to_section()?);
        Ok(file)
    }
}

/// Public projection of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    allowed_ips: NetSlice,
    public_key: Key,
    psk: Option<PresharedKey>,
}

impl Peer {
    pub fn new(allowed_ips: NetSlice, public_key: Key, psk: Option<PresharedKey>) -> Self {
        Peer {
            allowed_ips,
            public_key,
            psk,
        }
    }

    pub fn allowed_ips(&self) -> &NetSlice {
        &self.allowed_ips
    }

    pub fn public_key(&self) -> &Key {
        &self.public_key
    }

    pub fn psk(&self) -> Option<&PresharedKey> {
        self.psk.as_ref()
    }

    fn write_section(&self, section: &mut Section) -> Result<()> {
        section.set("PublicKey", self.public_key.base64())?;
        if let Some(psk) = &self.psk {
            section.set("PresharedKey", psk.base64())?;
        }
        section.set("AllowedIPs", self.allowed_ips.to_string())?;
        Ok(())
    }

    fn read_section(section: &Section) -> Result<Self> {
        let public_key = section.get_key_from_base64("PublicKey")?;
        let allowed_ips = section.get_net_slice("AllowedIPs")?;
        let psk = if section.has_key("PresharedKey") {
            Some(section.get_psk_from_base64("PresharedKey")?)
        } else {
            None
        };
        Ok(Peer {
            allowed_ips,
            public_key,
            psk,
        })
    }
}

/// The server seen from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAsPeer {
    peer: Peer,
    endpoint: String,
}

impl ServerAsPeer {
    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// `host:port`
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn to_section(&self) -> Result<Section> {
        let mut section = Section::new(PEER_SECTION);
        self.peer.write_section(&mut section)?;
        section.set("Endpoint", self.endpoint.as_str())?;
        Ok(section)
    }
}

/// A client seen from the server, as stored in the server file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAsPeer {
    peer: Peer,
}

impl ClientAsPeer {
    pub fn new(peer: Peer) -> Self {
        ClientAsPeer { peer }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    /// Read a `[Peer]` section of a server file
    pub fn from_section(section: &Section) -> Result<Self> {
        Peer::read_section(section)
            .map(ClientAsPeer::new)
            .map_err(|e| Error::InvalidPeer(Box::new(e)))
    }

    pub fn to_section(&self) -> Result<Section> {
        let mut section = Section::new(PEER_SECTION);
        self.peer.write_section(&mut section)?;
        Ok(section)
    }
}

macro_rules! display_as_section {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    let section = self.to_section().map_err(|_| fmt::Error)?;
                    write!(f, "{}", section)
                }
            }
        )*
    };
}

display_as_section!(Server, Client, ServerAsPeer, ClientAsPeer);
