//! Error types for wg-easy-vpn

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading, mutating or writing VPN configuration
#[derive(Error, Debug)]
pub enum Error {
    /// File missing, unreadable or unwritable
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Section key outside [A-Za-z0-9_]
    #[error("key {key} contains invalid characters ('{found}')")]
    InvalidSectionKey { key: String, found: char },

    #[error("unknown key {key} in section [{section}]")]
    MissingKey { section: String, key: String },

    #[error("unknown section [{0}]")]
    MissingSection(String),

    #[error("invalid integer for {key}: {value} ({source})")]
    InvalidInteger {
        key: String,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("invalid base64 value: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// Decoded key material shorter than 32 bytes
    #[error("the input is not big enough (expected {expected} bytes, got {got})")]
    KeyLength { expected: usize, got: usize },

    #[error("invalid network {value}: {source}")]
    InvalidNetwork {
        value: String,
        #[source]
        source: ipnet::AddrParseError,
    },

    #[error("invalid IP address {value}: {source}")]
    InvalidIp {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("empty network list")]
    EmptyNetworks,

    #[error("invalid [Interface] section: {0}")]
    InvalidServer(#[source] Box<Error>),

    #[error("invalid [Peer] section: {0}")]
    InvalidPeer(#[source] Box<Error>),

    #[error("invalid metadata for connection {name}: {source}")]
    InvalidMetadata {
        name: String,
        #[source]
        source: Box<Error>,
    },

    #[error("{} has no [Interface] section", .path.display())]
    MissingInterface { path: PathBuf },

    #[error("{} has more than one [Interface] section", .path.display())]
    DuplicateInterface { path: PathBuf },

    #[error("metadata of connection {0} has not been loaded")]
    MissingMetadata(String),

    /// Legacy increment hit a low byte of 255
    #[error("cannot increment {0} (limit case, last byte is 255)")]
    IncrementLimit(String),

    #[error("no address available in {0}")]
    NoAddressAvailable(String),

    #[error("this peer ({0}) is not in the VPN")]
    PeerNotFound(String),

    #[error("configuration file {} already exists", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} already contains information about the {name} connection", .path.display())]
    ConnectionExists { path: PathBuf, name: String },

    #[error("QR code encoding failed: {0}")]
    QrCode(#[from] qrcode::types::QrError),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
