//! In-memory blob store
//!
//! This module provides an in-memory implementation of [`BlobStore`],
//! suitable for testing and simulation environments. Nothing survives a
//! restart.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tilecache_core::{BlobId, Descriptor, FeatureBody, FeatureSource, IdentityError, TileRange};
use tracing::{debug, info, trace};

use crate::BlobStore;
use crate::checksum::{BlobMeta, Checksum};
use crate::error::StorageError;
use crate::lifecycle::Lifecycle;
use crate::listener::ListenerList;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    checksum: Checksum,
}

impl StoredBlob {
    fn new(data: Bytes) -> Self {
        let checksum = Checksum::of(&data);
        Self { data, checksum }
    }

    fn meta(&self) -> BlobMeta {
        BlobMeta::new(self.data.len() as u64, self.checksum)
    }
}

/// In-memory implementation of BlobStore
///
/// Uses `DashMap` for concurrent access. Each entry is replaced as a whole,
/// so readers always see a complete payload.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<BlobId, StoredBlob>,
    lifecycle: Lifecycle,
    listeners: ListenerList,
}

impl InMemoryBlobStore {
    /// Create a new, empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Remove every blob matching `predicate`, returning how many were removed
    fn remove_where(&self, predicate: impl Fn(&BlobId) -> bool) -> usize {
        let mut removed = 0;
        self.blobs.retain(|id, _| {
            if predicate(id) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, object: &Descriptor) -> Result<(), StorageError> {
        self.lifecycle.ensure_live()?;
        object.validate()?;

        match object {
            Descriptor::Tile(tile) => {
                let data = tile.blob().cloned().ok_or(IdentityError::MissingPayload)?;
                let size = data.len() as u64;
                trace!(tile = %tile.id, size, "Storing tile");

                let previous = self
                    .blobs
                    .insert(BlobId::Tile(tile.id.clone()), StoredBlob::new(data));
                self.listeners
                    .tile_put(&tile.id, size, previous.map(|p| p.data.len() as u64));
            }
            Descriptor::Feature(feature) => {
                let data = match feature.source().ok_or(IdentityError::MissingPayload)? {
                    FeatureSource::Bytes(data) => data.clone(),
                    FeatureSource::File(path) => Bytes::from(tokio::fs::read(path).await?),
                };
                let size = data.len() as u64;
                trace!(feature = %feature.id, size, "Storing feature response");

                self.blobs
                    .insert(BlobId::Feature(feature.id.clone()), StoredBlob::new(data));
                self.listeners
                    .notify(|l| l.feature_stored(&feature.id, size));
            }
        }

        Ok(())
    }

    async fn get(&self, object: &mut Descriptor) -> Result<Option<BlobMeta>, StorageError> {
        self.lifecycle.ensure_live()?;
        object.validate()?;

        let Some(stored) = self.blobs.get(&object.blob_id()).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let meta = stored.meta();

        match object {
            Descriptor::Tile(tile) => tile.set_blob(stored.data),
            Descriptor::Feature(feature) => {
                let length = stored.data.len() as u64;
                feature.set_body(FeatureBody::new(std::io::Cursor::new(stored.data), length));
            }
        }

        Ok(Some(meta))
    }

    async fn delete(&self, id: &BlobId) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        id.validate()?;

        if self.blobs.remove(id).is_none() {
            return Ok(false);
        }

        trace!(blob = %id, "Deleted blob");
        match id {
            BlobId::Tile(tile) => self.listeners.notify(|l| l.tile_deleted(tile)),
            BlobId::Feature(feature) => self.listeners.notify(|l| l.feature_deleted(feature)),
        }
        Ok(true)
    }

    async fn delete_layer(&self, layer: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;

        let removed = self.remove_where(|id| id.layer() == layer);
        debug!(layer, removed, "Deleted layer");

        if removed > 0 {
            self.listeners.notify(|l| l.layer_deleted(layer));
        }
        Ok(removed > 0)
    }

    async fn delete_range(&self, range: &TileRange) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        range.validate()?;

        let removed = self.remove_where(|id| matches!(id, BlobId::Tile(tile) if range.contains(tile)));
        debug!(layer = %range.layer, removed, "Deleted tile range");

        if removed > 0 {
            self.listeners.notify(|l| l.range_deleted(range));
        }
        Ok(removed > 0)
    }

    async fn delete_grid_set(&self, layer: &str, grid_set: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;
        IdentityError::require("grid_set", grid_set)?;

        let removed = self.remove_where(
            |id| matches!(id, BlobId::Tile(tile) if tile.layer == layer && tile.grid_set == grid_set),
        );
        debug!(layer, grid_set, removed, "Deleted grid set");

        if removed > 0 {
            self.listeners.notify(|l| l.grid_set_deleted(layer, grid_set));
        }
        Ok(removed > 0)
    }

    async fn rename_layer(&self, old_name: &str, new_name: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", old_name)?;
        IdentityError::require("layer", new_name)?;

        if self.blobs.iter().any(|e| e.key().layer() == new_name) {
            return Err(IdentityError::LayerExists(new_name.to_string()).into());
        }

        let ids: Vec<BlobId> = self
            .blobs
            .iter()
            .filter(|e| e.key().layer() == old_name)
            .map(|e| e.key().clone())
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }

        for id in ids {
            if let Some((id, blob)) = self.blobs.remove(&id) {
                let renamed = match id {
                    BlobId::Tile(mut tile) => {
                        tile.layer = new_name.to_string();
                        BlobId::Tile(tile)
                    }
                    BlobId::Feature(mut feature) => {
                        feature.layer = new_name.to_string();
                        BlobId::Feature(feature)
                    }
                };
                self.blobs.insert(renamed, blob);
            }
        }

        info!(old_name, new_name, "Renamed layer");
        self.listeners.notify(|l| l.layer_renamed(old_name, new_name));
        Ok(true)
    }

    async fn layer_exists(&self, layer: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;
        Ok(self.blobs.iter().any(|e| e.key().layer() == layer))
    }

    async fn clear(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_live()?;
        self.blobs.clear();
        info!("Cleared in-memory blob store");
        Ok(())
    }

    async fn cache_size(&self, layer: &str) -> Result<u64, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;
        Ok(self
            .blobs
            .iter()
            .filter(|e| e.key().layer() == layer)
            .map(|e| e.value().data.len() as u64)
            .sum())
    }

    async fn destroy(&self) {
        if self.lifecycle.destroy() {
            self.blobs.clear();
            info!("In-memory blob store destroyed");
        }
    }

    fn listeners(&self) -> &ListenerList {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tilecache_core::{FeatureId, FeatureObject, TileBounds, TileId, TileObject};

    use crate::listener::tests::Recorder;

    fn tile(layer: &str, zoom: u32, x: u64, y: u64) -> TileId {
        TileId::new(layer, "EPSG:4326", "image/png", zoom, x, y)
    }

    async fn put_tile(store: &InMemoryBlobStore, id: TileId, data: &[u8]) {
        store
            .put(&TileObject::new(id).with_blob(data.to_vec()).into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryBlobStore::new();
        put_tile(&store, tile("L", 1, 0, 0), b"png bytes").await;

        let mut desc = Descriptor::from(TileObject::new(tile("L", 1, 0, 0)));
        let meta = store.get(&mut desc).await.unwrap().unwrap();
        assert_eq!(meta.size, 9);
        assert_eq!(desc.tile_blob().unwrap().as_ref(), b"png bytes");

        let id = BlobId::from(tile("L", 1, 0, 0));
        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_missing_payload_is_invalid() {
        let store = InMemoryBlobStore::new();
        let result = store.put(&TileObject::new(tile("L", 0, 0, 0)).into()).await;
        assert!(matches!(
            result,
            Err(StorageError::InvalidIdentity(IdentityError::MissingPayload))
        ));
    }

    #[tokio::test]
    async fn test_feature_round_trip() {
        let store = InMemoryBlobStore::new();
        let id = FeatureId::new("roads", 7);
        let payload = Bytes::from_static(b"<wfs:FeatureCollection/>");
        store
            .put(&FeatureObject::new(id.clone())
                .with_source(FeatureSource::Bytes(payload.clone()))
                .into())
            .await
            .unwrap();

        let mut desc = Descriptor::from(FeatureObject::new(id));
        let meta = store.get(&mut desc).await.unwrap().unwrap();
        assert_eq!(meta.size, payload.len() as u64);

        let body = desc.as_feature_mut().unwrap().take_body().unwrap();
        assert_eq!(body.into_bytes().await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_range_and_grid_set_deletes() {
        let store = InMemoryBlobStore::new();
        for x in 0..4 {
            put_tile(&store, tile("L", 2, x, 0), b"t").await;
        }
        let mut other_grid = tile("L", 2, 0, 0);
        other_grid.grid_set = "EPSG:900913".to_string();
        put_tile(&store, other_grid.clone(), b"g").await;

        let range = TileRange::new("L", "EPSG:4326", "image/png", 0)
            .with_level(2, TileBounds::new(1, 0, 2, 0));
        assert!(store.delete_range(&range).await.unwrap());
        assert!(!store.delete_range(&range).await.unwrap());
        assert_eq!(store.len(), 3);

        assert!(store.delete_grid_set("L", "EPSG:4326").await.unwrap());
        assert_eq!(store.len(), 1);
        assert!(store.blobs.contains_key(&BlobId::from(other_grid)));
    }

    #[tokio::test]
    async fn test_rename_layer() {
        let store = InMemoryBlobStore::new();
        put_tile(&store, tile("old", 0, 0, 0), b"a").await;
        put_tile(&store, tile("taken", 0, 0, 0), b"b").await;

        assert!(matches!(
            store.rename_layer("old", "taken").await,
            Err(StorageError::InvalidIdentity(IdentityError::LayerExists(_)))
        ));
        assert!(store.rename_layer("old", "new").await.unwrap());
        assert!(!store.layer_exists("old").await.unwrap());
        assert_eq!(store.cache_size("new").await.unwrap(), 1);
        assert!(!store.rename_layer("old", "other").await.unwrap());
    }

    #[tokio::test]
    async fn test_listener_notifications() {
        let store = InMemoryBlobStore::new();
        let recorder = Arc::new(Recorder::default());
        store.listeners().add(recorder.clone());

        put_tile(&store, tile("L", 0, 0, 0), b"one").await;
        put_tile(&store, tile("L", 0, 0, 0), b"three").await;
        store.delete(&tile("L", 0, 0, 0).into()).await.unwrap();
        put_tile(&store, tile("L", 0, 0, 0), b"one").await;
        store.delete_layer("L").await.unwrap();
        // Nothing left, so no second notification
        store.delete_layer("L").await.unwrap();

        let events = recorder.events.lock();
        assert_eq!(events.len(), 5);
        assert!(events[0].starts_with("stored"));
        assert!(events[1].ends_with("5 3"));
        assert!(events[2].starts_with("deleted"));
        assert_eq!(events[4], "layer L");
    }
}
