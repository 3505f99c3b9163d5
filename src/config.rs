//! Persistent settings of the tool
//!
//! Values come from built-in defaults, then an optional settings file, then
//! `WG_EASY_VPN_*` environment variables. Command-line flags are applied on
//! top by the caller.
use crate::error::Result;
use crate::network::NetSlice;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Suffix of server and client configuration files
pub const CONFIG_SUFFIX: &str = ".conf";

/// Prefix of the environment variables overriding settings
pub const ENV_PREFIX: &str = "WG_EASY_VPN";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding server configuration files
    pub server_dir: PathBuf,

    /// Directory holding client configuration files
    pub client_dir: PathBuf,

    /// Port the server listens on
    pub listen_port: u16,

    /// Comma-separated networks of a new server
    pub network: String,

    /// Comma-separated destinations routed through the tunnel by clients
    pub routes: String,

    /// Connection metadata file, relative to `server_dir`
    pub metadata_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server_dir: PathBuf::from("/etc/wireguard"),
            client_dir: PathBuf::from("/etc/wireguard/clients"),
            listen_port: 52820,
            network: "192.168.0.1/24".to_string(),
            routes: "0.0.0.0/0, ::/0".to_string(),
            metadata_file: PathBuf::from(".wg-easy-vpn.conf"),
        }
    }
}

impl Settings {
    /// Layer an optional settings file (format from its extension) and the
    /// environment over the defaults
    pub fn load(file: Option<&Path>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
    }

    pub fn server_file(&self, connection: &str) -> PathBuf {
        self.server_dir.join(format!("{}{}", connection, CONFIG_SUFFIX))
    }

    pub fn client_file(&self, client: &str) -> PathBuf {
        self.client_dir.join(format!("{}{}", client, CONFIG_SUFFIX))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.server_dir.join(&self.metadata_file)
    }

    pub fn networks(&self) -> Result<NetSlice> {
        self.network.parse()
    }

    pub fn default_routes(&self) -> Result<NetSlice> {
        self.routes.parse()
    }
}
