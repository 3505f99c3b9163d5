//! Key material for VPN nodes
pub mod keys;

pub use keys::{Key, KeyPair, PresharedKey, KEY_LEN, PSK_LEN};
