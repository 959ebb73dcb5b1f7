//! Mutation notifications
//!
//! Cache engines keep side tables (disk quota usage, layer statistics) in step
//! with the blob store by registering a [`BlobStoreListener`]. Listeners are
//! called after the mutation has been committed, on the calling task.

use std::sync::Arc;

use parking_lot::RwLock;
use tilecache_core::{FeatureId, TileId, TileRange};

/// Receives notifications about committed mutations
///
/// All methods default to no-ops so implementors only override what they need.
pub trait BlobStoreListener: Send + Sync {
    /// A tile was stored at an identity that held no blob
    fn tile_stored(&self, _id: &TileId, _size: u64) {}

    /// A tile replaced an existing blob
    fn tile_updated(&self, _id: &TileId, _size: u64, _old_size: u64) {}

    fn tile_deleted(&self, _id: &TileId) {}

    fn feature_stored(&self, _id: &FeatureId, _size: u64) {}

    fn feature_deleted(&self, _id: &FeatureId) {}

    fn layer_deleted(&self, _layer: &str) {}

    fn layer_renamed(&self, _old_name: &str, _new_name: &str) {}

    fn grid_set_deleted(&self, _layer: &str, _grid_set: &str) {}

    fn range_deleted(&self, _range: &TileRange) {}
}

/// Registered listeners of a store
#[derive(Default)]
pub struct ListenerList {
    listeners: RwLock<Vec<Arc<dyn BlobStoreListener>>>,
}

impl ListenerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, listener: Arc<dyn BlobStoreListener>) {
        self.listeners.write().push(listener);
    }

    /// Remove a previously added listener
    ///
    /// Returns true if the listener was registered.
    pub fn remove(&self, listener: &Arc<dyn BlobStoreListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Call `f` on every listener
    ///
    /// The list is snapshotted first so listeners may add or remove listeners.
    pub fn notify(&self, f: impl Fn(&dyn BlobStoreListener)) {
        let snapshot: Vec<_> = self.listeners.read().clone();
        for listener in snapshot {
            f(listener.as_ref());
        }
    }

    /// Notify a tile put, as a store or an update depending on the prior size
    pub fn tile_put(&self, id: &TileId, size: u64, old_size: Option<u64>) {
        match old_size {
            Some(old_size) => self.notify(|l| l.tile_updated(id, size, old_size)),
            None => self.notify(|l| l.tile_stored(id, size)),
        }
    }
}

impl std::fmt::Debug for ListenerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerList")
            .field("len", &self.len())
            .finish()
    }
}
