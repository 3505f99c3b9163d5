//! Key management functionality
use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use tracing::debug;
use x25519_dalek::{PublicKey, StaticSecret};

/// Curve25519 key size in bytes
pub const KEY_LEN: usize = 32;

/// Pre-shared key size in bytes
pub const PSK_LEN: usize = 32;

/// Copy the first `N` bytes of `slice` into `dst`.
/// Shorter input is rejected, longer input is truncated.
fn fill_from_slice<const N: usize>(dst: &mut [u8; N], slice: &[u8]) -> Result<()> {
    if slice.len() < N {
        return Err(Error::KeyLength {
            expected: N,
            got: slice.len(),
        });
    }
    if slice.len() > N {
        debug!("Ignoring {} trailing key bytes", slice.len() - N);
    }
    dst.copy_from_slice(&slice[..N]);
    Ok(())
}

/// A Curve25519 key, either private or public
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// A key filled with zeros
    pub fn zero() -> Self {
        Key([0u8; KEY_LEN])
    }

    /// Generate a new random key
    pub fn random() -> Self {
        let mut key = Self::zero();
        OsRng.fill_bytes(&mut key.0);
        key
    }

    pub fn from_bytes(slice: &[u8]) -> Result<Self> {
        let mut key = Self::zero();
        key.update_from_bytes(slice)?;
        Ok(key)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let mut key = Self::zero();
        key.update_from_base64(s)?;
        Ok(key)
    }

    /// Overwrite the key with the first 32 bytes of `slice`
    pub fn update_from_bytes(&mut self, slice: &[u8]) -> Result<()> {
        fill_from_slice(&mut self.0, slice)
    }

    /// Overwrite the key from a base64 encoded string
    pub fn update_from_base64(&mut self, s: &str) -> Result<()> {
        let raw = BASE64.decode(s.trim())?;
        self.update_from_bytes(&raw)
    }

    /// Derive the public key (X25519 with the standard base point)
    pub fn public(&self) -> Key {
        let secret = StaticSecret::from(self.0);
        Key(PublicKey::from(&secret).to_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    pub fn base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Optional symmetric secret shared by a pair of peers
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PresharedKey([u8; PSK_LEN]);

impl PresharedKey {
    pub fn zero() -> Self {
        PresharedKey([0u8; PSK_LEN])
    }

    /// Generate a new random pre-shared key
    pub fn random() -> Self {
        let mut psk = Self::zero();
        OsRng.fill_bytes(&mut psk.0);
        psk
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let mut psk = Self::zero();
        psk.update_from_base64(s)?;
        Ok(psk)
    }

    pub fn update_from_bytes(&mut self, slice: &[u8]) -> Result<()> {
        fill_from_slice(&mut self.0, slice)
    }

    pub fn update_from_base64(&mut self, s: &str) -> Result<()> {
        let raw = BASE64.decode(s.trim())?;
        self.update_from_bytes(&raw)
    }

    /// Whether the key is all zeros
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; PSK_LEN] {
        &self.0
    }

    pub fn base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresharedKey(..)")
    }
}

/// Key pair for a VPN node
pub struct KeyPair {
    private_key: Key,
    public_key: Key,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_private(Key::random())
    }

    pub fn from_private(private_key: Key) -> Self {
        KeyPair {
            public_key: private_key.public(),
            private_key,
        }
    }

    pub fn private_key(&self) -> &Key {
        &self.private_key
    }

    pub fn public_key(&self) -> &Key {
        &self.public_key
    }
}
