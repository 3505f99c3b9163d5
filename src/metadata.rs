//! Per-connection metadata stored next to the server files
//!
//! One shared document holds a section per connection name with the public
//! endpoint, the networks clients are allocated from and optional DNS servers.
use crate::error::{Error, Result};
use crate::ini::{format_ip_list, ConfigFile, Section};
use crate::network::NetSlice;
use std::net::IpAddr;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    endpoint: String,
    networks: NetSlice,
    dns: Vec<IpAddr>,
}

impl Metadata {
    pub fn new(endpoint: impl Into<String>, networks: NetSlice, dns: Vec<IpAddr>) -> Self {
        Metadata {
            endpoint: endpoint.into(),
            networks,
            dns,
        }
    }

    /// Public address or domain name of the server
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Networks client addresses are allocated from
    pub fn networks(&self) -> &NetSlice {
        &self.networks
    }

    pub fn dns(&self) -> &[IpAddr] {
        &self.dns
    }

    /// Load the metadata of connection `name` from the shared file
    pub fn load(name: &str, path: &Path) -> Result<Self> {
        let file = ConfigFile::parse(path)?;
        let section = file.get_section(name)?;
        Self::from_section(section).map_err(|e| Error::InvalidMetadata {
            name: name.to_string(),
            source: Box::new(e),
        })
    }

    pub fn from_section(section: &Section) -> Result<Self> {
        let dns = if section.has_key("DNS") {
            section.get_ip_array("DNS")?
        } else {
            Vec::new()
        };
        let endpoint = section.get("Endpoint")?.to_string();
        let networks = section.get_net_slice("Network")?;
        Ok(Metadata {
            endpoint,
            networks,
            dns,
        })
    }

    pub fn to_section(&self, name: &str) -> Result<Section> {
        let mut section = Section::new(name);
        section.set("Endpoint", self.endpoint.as_str())?;
        section.set("Network", self.networks.to_string())?;
        if !self.dns.is_empty() {
            section.set("DNS", format_ip_list(&self.dns))?;
        }
        Ok(section)
    }

    /// Record the metadata of connection `name` in the shared file.
    ///
    /// Sections of other connections are kept. An existing section for `name`
    /// is only replaced when `force` is set.
    pub fn save(&self, name: &str, path: &Path, force: bool) -> Result<()> {
        let mut file = if path.exists() {
            ConfigFile::parse(path)?
        } else {
            ConfigFile::new()
        };
        if file.has_section(name) {
            if !force {
                return Err(Error::ConnectionExists {
                    path: path.to_path_buf(),
                    name: name.to_string(),
                });
            }
            while file.remove_section(name).is_some() {}
        }
        file.push_section(self.to_section(name)?);
        file.save(path)?;
        info!("Saved metadata of {} to {}", name, path.display());
        Ok(())
    }
}
