//! Record header written in front of every stored payload
//!
//! ```text
//! 0..4    magic "TCB1"
//! 4       kind (1 = tile, 2 = feature response)
//! 5..8    reserved, zero
//! 8..16   payload length, little endian
//! 16..48  BLAKE3 checksum of the payload
//! ```

use crate::checksum::{BlobMeta, Checksum};
use crate::error::StorageError;

pub const MAGIC: [u8; 4] = *b"TCB1";
pub const HEADER_LEN: usize = 48;

/// Blob family a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    Tile = 1,
    Feature = 2,
}

impl RecordKind {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(RecordKind::Tile),
            2 => Some(RecordKind::Feature),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: RecordKind,
    pub length: u64,
    pub checksum: Checksum,
}

impl RecordHeader {
    pub fn new(kind: RecordKind, length: u64, checksum: Checksum) -> Self {
        Self {
            kind,
            length,
            checksum,
        }
    }

    /// Header describing a payload held in memory
    pub fn for_payload(kind: RecordKind, payload: &[u8]) -> Self {
        Self::new(kind, payload.len() as u64, Checksum::of(payload))
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&MAGIC);
        out[4] = self.kind as u8;
        out[8..16].copy_from_slice(&self.length.to_le_bytes());
        out[16..48].copy_from_slice(self.checksum.as_bytes());
        out
    }

    /// Decode a header, checking it belongs to the expected family
    pub fn decode(raw: &[u8], expected: RecordKind) -> Result<Self, StorageError> {
        if raw.len() < HEADER_LEN {
            return Err(StorageError::corruption(format!(
                "truncated header: {} bytes",
                raw.len()
            )));
        }
        if raw[0..4] != MAGIC {
            return Err(StorageError::corruption("bad record magic"));
        }
        let kind = RecordKind::from_byte(raw[4])
            .ok_or_else(|| StorageError::corruption(format!("unknown record kind {}", raw[4])))?;
        if kind != expected {
            return Err(StorageError::corruption(format!(
                "expected {:?} record, found {:?}",
                expected, kind
            )));
        }

        let mut length = [0u8; 8];
        length.copy_from_slice(&raw[8..16]);
        let mut checksum = [0u8; 32];
        checksum.copy_from_slice(&raw[16..48]);

        Ok(Self::new(kind, u64::from_le_bytes(length), Checksum(checksum)))
    }

    /// Check a payload against the length and checksum recorded here
    pub fn verify(&self, payload: &[u8]) -> Result<(), StorageError> {
        self.verify_length(payload.len() as u64)?;
        self.verify_checksum(Checksum::of(payload))
    }

    pub fn verify_length(&self, actual: u64) -> Result<(), StorageError> {
        if actual != self.length {
            return Err(StorageError::corruption(format!(
                "payload length {} does not match recorded {}",
                actual, self.length
            )));
        }
        Ok(())
    }

    pub fn verify_checksum(&self, actual: Checksum) -> Result<(), StorageError> {
        if actual != self.checksum {
            return Err(StorageError::corruption(format!(
                "checksum {} does not match recorded {}",
                actual, self.checksum
            )));
        }
        Ok(())
    }

    pub fn meta(&self) -> BlobMeta {
        BlobMeta::new(self.length, self.checksum)
    }
}
