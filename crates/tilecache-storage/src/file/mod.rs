//! Filesystem blob store
//!
//! Stores each blob as one file in a hierarchy derived from its identity.
//! Writes are atomic per blob and records carry a BLAKE3 checksum.

mod config;
pub mod layout;
pub mod record;
mod store;
mod walk;

pub use config::FileBlobStoreConfig;
pub use store::FileBlobStore;
