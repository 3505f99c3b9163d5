//! Create and maintain WireGuard server and client configuration files
//!
//! A connection is a server configuration file (`<server_dir>/<name>.conf`)
//! plus a section of the shared metadata file describing how clients reach
//! it. Adding a client allocates it a free address in every network of the
//! connection, writes its own configuration file and registers it as a peer
//! of the server.
pub mod cli;
pub mod commands;
pub mod config;
pub mod encryption;
pub mod error;
pub mod export;
pub mod ini;
pub mod metadata;
pub mod network;
pub mod node;
pub mod vpn;

pub use error::{Error, Result};
