//! Error types for tilecache-storage
//!
//! Every store operation surfaces a single [`StorageError`] type. Absence of a
//! blob is never an error: it is reported as `None` from get and `false` from
//! delete.

use tilecache_core::IdentityError;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage root is missing, unreadable or otherwise not usable
    #[error("Storage not configured: {0}")]
    NotConfigured(String),

    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// A stored payload failed its integrity check
    #[error("Corrupt blob: {0}")]
    Corruption(String),

    /// Descriptor does not carry a usable identity
    #[error("Invalid identity: {0}")]
    InvalidIdentity(#[from] IdentityError),

    /// Operation attempted after the store was destroyed
    #[error("Blob store has been destroyed")]
    Destroyed,
}

/// Discriminant of a [`StorageError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    NotConfigured,
    Io,
    Corruption,
    InvalidIdentity,
    Destroyed,
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl StorageError {
    /// Create a new NotConfigured error
    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::NotConfigured(message.into())
    }

    /// Create a new I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io(message.into())
    }

    /// Create a new Corruption error
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption(message.into())
    }

    pub fn kind(&self) -> StorageErrorKind {
        match self {
            StorageError::NotConfigured(_) => StorageErrorKind::NotConfigured,
            StorageError::Io(_) => StorageErrorKind::Io,
            StorageError::Corruption(_) => StorageErrorKind::Corruption,
            StorageError::InvalidIdentity(_) => StorageErrorKind::InvalidIdentity,
            StorageError::Destroyed => StorageErrorKind::Destroyed,
        }
    }

    /// Whether the caller may reasonably retry the operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read only");
        let storage_err: StorageError = io_err.into();
        assert_eq!(storage_err.kind(), StorageErrorKind::Io);
        assert!(storage_err.is_retryable());
        assert!(storage_err.to_string().contains("read only"));
    }

    #[test]
    fn test_identity_error_conversion() {
        let err: StorageError = IdentityError::MissingField("layer").into();
        assert_eq!(err.kind(), StorageErrorKind::InvalidIdentity);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_corruption_error() {
        let err = StorageError::corruption("checksum mismatch");
        assert!(matches!(err, StorageError::Corruption(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_destroyed_error() {
        let err = StorageError::Destroyed;
        assert_eq!(err.kind(), StorageErrorKind::Destroyed);
        assert_eq!(err.to_string(), "Blob store has been destroyed");
    }
}
