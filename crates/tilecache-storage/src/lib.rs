//! # Tilecache Storage
//!
//! Blob persistence for a tile and feature cache.
//!
//! The cache engine computes identities, enforces freshness and serves
//! clients; this crate owns only the payload bytes. Every backend implements
//! the [`BlobStore`] trait and agrees on identity, per-blob atomicity,
//! scope-wide deletion and size accounting.
//!
//! ## Features
//!
//! - **BlobStore trait**: put / get / delete over a tagged [`Descriptor`]
//! - **FileBlobStore**: filesystem hierarchy with atomic replace and checksums
//! - **InMemoryBlobStore**: `DashMap` backed store for tests and simulation
//! - **Listeners**: notifications after committed mutations
//!
//! ## Example
//!
//! ```rust,ignore
//! use tilecache_core::{Descriptor, TileId, TileObject};
//! use tilecache_storage::{BlobStore, FileBlobStore, FileBlobStoreConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = FileBlobStore::open(FileBlobStoreConfig::new("./cache")).await.unwrap();
//!     let id = TileId::new("topp:states", "EPSG:4326", "image/png", 3, 2, 1);
//!
//!     store
//!         .put(&TileObject::new(id.clone()).with_blob(vec![0xAB; 1024]).into())
//!         .await
//!         .unwrap();
//!
//!     let mut desc = Descriptor::from(TileObject::new(id));
//!     let meta = store.get(&mut desc).await.unwrap();
//!     assert_eq!(meta.map(|m| m.size), Some(1024));
//!
//!     store.destroy().await;
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod listener;
pub mod memory;

// Re-exports
pub use checksum::{BlobMeta, Checksum};
pub use error::{StorageError, StorageErrorKind};
pub use file::{FileBlobStore, FileBlobStoreConfig};
pub use lifecycle::Lifecycle;
pub use listener::{BlobStoreListener, ListenerList};
pub use memory::InMemoryBlobStore;

// Re-export identity types for convenience
pub use tilecache_core::{
    BlobId, Descriptor, FeatureBody, FeatureId, FeatureObject, FeatureSource, TileBounds, TileId,
    TileObject, TileRange,
};

use async_trait::async_trait;

/// Bytes per megabyte as reported by [`BlobStore::cache_size_mb`]
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Persistence facade for tile and feature payloads
///
/// Implementations must be safe to call from many tasks at once. Operations
/// on distinct identities are independent; operations on one identity are
/// sequentially consistent and never expose a partially written payload.
///
/// Once [`destroy`](BlobStore::destroy) has been called every other operation
/// fails with [`StorageError::Destroyed`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store the payload carried by a descriptor
    ///
    /// Replaces any previous payload with the same identity. The replacement
    /// is atomic with respect to concurrent readers, and a failed put leaves
    /// the previous payload intact. The descriptor is not modified.
    ///
    /// # Errors
    ///
    /// `InvalidIdentity` if identity fields or the payload are missing,
    /// `Io` if the backend cannot durably commit.
    async fn put(&self, object: &Descriptor) -> Result<(), StorageError>;

    /// Look up the blob named by a descriptor
    ///
    /// When present, fills the descriptor's payload slot (tile bytes, or a
    /// readable [`FeatureBody`] for feature responses) and returns its size and
    /// checksum. A stored empty payload is `Some` with size 0. When absent,
    /// returns `None` and leaves the descriptor untouched.
    ///
    /// # Errors
    ///
    /// `Corruption` if the stored payload fails its integrity check.
    async fn get(&self, object: &mut Descriptor) -> Result<Option<BlobMeta>, StorageError>;

    /// Remove a single blob
    ///
    /// Returns true if a blob was present and is now gone.
    async fn delete(&self, id: &BlobId) -> Result<bool, StorageError>;

    /// Remove every tile and feature response of a layer
    ///
    /// Returns true if any data was removed.
    async fn delete_layer(&self, layer: &str) -> Result<bool, StorageError>;

    /// Remove every tile selected by a range
    ///
    /// Deletion is pointwise: on failure some tiles may already be gone, but
    /// each tile is either intact or fully removed. Returns true if at least
    /// one tile was removed.
    async fn delete_range(&self, range: &TileRange) -> Result<bool, StorageError>;

    /// Remove every tile of a layer in one grid set
    async fn delete_grid_set(&self, layer: &str, grid_set: &str) -> Result<bool, StorageError>;

    /// Move every blob of a layer under a new name
    ///
    /// Returns false if the old layer holds no storage.
    ///
    /// # Errors
    ///
    /// `InvalidIdentity` if the new layer already exists.
    async fn rename_layer(&self, old_name: &str, new_name: &str) -> Result<bool, StorageError>;

    /// Whether any storage exists for a layer
    async fn layer_exists(&self, layer: &str) -> Result<bool, StorageError>;

    /// Destroy every blob managed by the store
    ///
    /// Reserved for tests and administration; callers must be quiescent.
    async fn clear(&self) -> Result<(), StorageError>;

    /// Approximate total payload size of a layer, in bytes
    ///
    /// Safe to run concurrently with every other operation. The result
    /// reflects some serial ordering of completed operations; mutations that
    /// overlap the call may or may not be counted.
    async fn cache_size(&self, layer: &str) -> Result<u64, StorageError>;

    /// Approximate total payload size of a layer, in megabytes
    async fn cache_size_mb(&self, layer: &str) -> Result<f64, StorageError> {
        Ok(self.cache_size(layer).await? as f64 / BYTES_PER_MB)
    }

    /// End the store's life, releasing every resource it holds
    ///
    /// Idempotent.
    async fn destroy(&self);

    /// Listeners notified after committed mutations
    fn listeners(&self) -> &ListenerList;
}
