//! Payload checksums

use serde::{Deserialize, Serialize};

/// BLAKE3 digest of a stored payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(pub [u8; 32]);

impl Checksum {
    /// Compute the checksum of a payload held in memory
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Finish an incremental hasher
    pub fn from_hasher(hasher: &blake3::Hasher) -> Self {
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Get the checksum as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Get a short hash for display (first 8 chars)
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_hex())
    }
}

/// Presence, size and integrity of a blob returned by get
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobMeta {
    /// Payload length in bytes
    pub size: u64,
    /// Checksum of the payload
    pub checksum: Checksum,
}

impl BlobMeta {
    pub fn new(size: u64, checksum: Checksum) -> Self {
        Self { size, checksum }
    }

    /// Describe a payload held in memory
    pub fn of(data: &[u8]) -> Self {
        Self::new(data.len() as u64, Checksum::of(data))
    }
}
