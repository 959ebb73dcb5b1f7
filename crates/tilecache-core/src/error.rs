//! Error types for tilecache identities

use thiserror::Error;

/// Errors raised when a descriptor cannot name a blob
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("Missing identity field: {0}")]
    MissingField(&'static str),

    #[error("Descriptor carries no payload")]
    MissingPayload,

    #[error("Layer already exists: {0}")]
    LayerExists(String),

    #[error("Tile range has no zoom levels")]
    EmptyRange,
}

impl IdentityError {
    /// Check a required string component is present
    pub fn require(field: &'static str, value: &str) -> Result<(), Self> {
        if value.is_empty() {
            Err(Self::MissingField(field))
        } else {
            Ok(())
        }
    }
}
