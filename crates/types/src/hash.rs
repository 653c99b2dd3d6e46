//! 32-byte content hash.

use std::fmt;

/// Size of a hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Errors from parsing a hex-encoded hash.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// The string contained non-hex characters.
    #[error("invalid hex string")]
    InvalidHex,

    /// The decoded value was not exactly 32 bytes.
    #[error("expected {HASH_SIZE} bytes, got {0}")]
    BadLength(usize),
}

/// A 32-byte blake3 content hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    /// Hash arbitrary bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    /// Wrap an existing 32-byte digest.
    pub const fn from_raw(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Wrap a 32-byte slice; `None` if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; HASH_SIZE] = bytes.try_into().ok()?;
        Some(Hash(raw))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(s).map_err(|_| HexError::InvalidHex)?;
        Self::from_slice(&bytes).ok_or(HexError::BadLength(bytes.len()))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({}…)", hex::encode(&self.0[..4]))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
