//! File blob store implementation
//!
//! Every blob is a single file holding a [`RecordHeader`] followed by the
//! payload. Writes go to a uniquely named temp file in the target directory,
//! are synced, and are then renamed over the target, so readers only ever
//! open committed files. Layer and grid-set deletes move the whole subtree
//! into a private trash directory with one rename before purging it.

use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tilecache_core::{
    BlobId, Descriptor, FeatureBody, FeatureSource, IdentityError, TileRange,
};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, instrument, trace, warn};
use uuid::Uuid;

use super::config::FileBlobStoreConfig;
use super::layout::{self, Layout, TRASH_DIR};
use super::record::{HEADER_LEN, RecordHeader, RecordKind};
use super::walk;
use crate::BlobStore;
use crate::checksum::{BlobMeta, Checksum};
use crate::error::StorageError;
use crate::lifecycle::Lifecycle;
use crate::listener::ListenerList;

/// How often a write is retried when its directory vanishes underneath it
const COMMIT_RETRIES: usize = 3;

/// Payload to commit
enum Payload<'a> {
    Bytes(&'a Bytes),
    File(&'a Path),
}

/// Filesystem implementation of BlobStore
#[derive(Debug)]
pub struct FileBlobStore {
    config: FileBlobStoreConfig,
    layout: Layout,
    lifecycle: Lifecycle,
    listeners: ListenerList,
}

impl FileBlobStore {
    /// Open a store over the configured root
    ///
    /// Leftovers of interrupted layer deletes are purged.
    ///
    /// # Errors
    ///
    /// `NotConfigured` if the root is missing (and `create_root` is off), is
    /// not a directory, or `copy_buffer_size` is zero.
    pub async fn open(config: FileBlobStoreConfig) -> Result<Self, StorageError> {
        if config.copy_buffer_size == 0 {
            return Err(StorageError::not_configured("copy_buffer_size must be at least 1"));
        }
        let root = config.root.clone();

        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(StorageError::not_configured(format!(
                    "{} is not a directory",
                    root.display()
                )));
            }
            Err(e) if e.kind() == ErrorKind::NotFound && config.create_root => {
                fs::create_dir_all(&root).await.map_err(|e| {
                    StorageError::not_configured(format!(
                        "cannot create {}: {}",
                        root.display(),
                        e
                    ))
                })?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_configured(format!(
                    "{} does not exist",
                    root.display()
                )));
            }
            Err(e) => {
                return Err(StorageError::not_configured(format!(
                    "cannot access {}: {}",
                    root.display(),
                    e
                )));
            }
        }

        let layout = Layout::new(root);
        let purged = walk::purge(&layout.trash_dir()).await?;
        if purged > 0 {
            info!(purged, "Purged blobs left by interrupted deletes");
        }

        info!(path = %layout.root().display(), sync_writes = config.sync_writes, "File blob store opened");

        Ok(Self {
            config,
            layout,
            lifecycle: Lifecycle::new(),
            listeners: ListenerList::new(),
        })
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    pub fn config(&self) -> &FileBlobStoreConfig {
        &self.config
    }

    /// Path a blob is stored at
    pub fn blob_path(&self, id: &BlobId) -> PathBuf {
        self.layout.blob_path(id)
    }

    /// Atomically replace the record at `target`, returning the payload size
    async fn commit(
        &self,
        target: &Path,
        kind: RecordKind,
        payload: Payload<'_>,
    ) -> Result<u64, StorageError> {
        for attempt in 0..=COMMIT_RETRIES {
            if let Some(size) = self.try_commit(target, kind, &payload).await? {
                return Ok(size);
            }
            debug!(path = %target.display(), attempt, "Blob directory vanished during write, retrying");
        }
        Err(StorageError::io(format!(
            "directory of {} kept disappearing during write",
            target.display()
        )))
    }

    /// One commit attempt; `None` when the target directory was removed concurrently
    async fn try_commit(
        &self,
        target: &Path,
        kind: RecordKind,
        payload: &Payload<'_>,
    ) -> Result<Option<u64>, StorageError> {
        let parent = target
            .parent()
            .ok_or_else(|| StorageError::io("blob path has no parent directory"))?;
        walk::create_dirs(parent, self.config.sync_writes).await?;

        let temp = layout::temp_path(target);
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let size = match self.fill(file, kind, payload).await {
            Ok(size) => size,
            Err(e) => {
                discard(&temp).await;
                return Err(e);
            }
        };

        match fs::rename(&temp, target).await {
            Ok(()) => {}
            Err(e) => {
                discard(&temp).await;
                if e.kind() == ErrorKind::NotFound {
                    return Ok(None);
                }
                return Err(e.into());
            }
        }

        if self.config.sync_writes {
            walk::sync_dir(parent).await?;
        }
        Ok(Some(size))
    }

    /// Write header and payload into a fresh temp file
    async fn fill(
        &self,
        mut file: File,
        kind: RecordKind,
        payload: &Payload<'_>,
    ) -> Result<u64, StorageError> {
        let length = match payload {
            Payload::Bytes(data) => {
                let header = RecordHeader::for_payload(kind, data);
                file.write_all(&header.encode()).await?;
                file.write_all(data).await?;
                header.length
            }
            Payload::File(source) => {
                // Header goes in last, once the streamed payload has been hashed
                file.write_all(&[0u8; HEADER_LEN]).await?;
                let (length, checksum) = self.copy_hashing(source, &mut file).await?;
                file.seek(SeekFrom::Start(0)).await?;
                file.write_all(&RecordHeader::new(kind, length, checksum).encode())
                    .await?;
                length
            }
        };

        file.flush().await?;
        if self.config.sync_writes {
            file.sync_all().await?;
        }
        Ok(length)
    }

    /// Stream a source file into `dest`, returning its length and checksum
    async fn copy_hashing(
        &self,
        source: &Path,
        dest: &mut File,
    ) -> Result<(u64, Checksum), StorageError> {
        let mut input = File::open(source).await.map_err(|e| {
            StorageError::io(format!(
                "cannot open feature source {}: {}",
                source.display(),
                e
            ))
        })?;

        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.config.copy_buffer_size];
        let mut length = 0u64;
        loop {
            let n = input.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            dest.write_all(&buf[..n]).await?;
            length += n as u64;
        }

        Ok((length, Checksum::from_hasher(&hasher)))
    }

    /// Payload size of a committed blob, if any
    async fn existing_size(path: &Path) -> Result<Option<u64>, StorageError> {
        match fs::metadata(path).await {
            Ok(meta) => Ok(Some(meta.len().saturating_sub(HEADER_LEN as u64))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_tile(&self, path: &Path) -> Result<Option<(Bytes, BlobMeta)>, StorageError> {
        let data = match fs::read(path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header = RecordHeader::decode(&data, RecordKind::Tile)?;
        let payload = data.slice(HEADER_LEN..);
        if let Err(e) = header.verify(&payload) {
            warn!(path = %path.display(), error = %e, "Tile failed integrity check");
            return Err(e);
        }

        Ok(Some((payload, header.meta())))
    }

    /// Verify a feature record and hand back a reader positioned at its payload
    async fn open_feature(
        &self,
        path: &Path,
    ) -> Result<Option<(FeatureBody, BlobMeta)>, StorageError> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut raw = [0u8; HEADER_LEN];
        if let Err(e) = file.read_exact(&mut raw).await {
            if e.kind() == ErrorKind::UnexpectedEof {
                return Err(StorageError::corruption("truncated feature header"));
            }
            return Err(e.into());
        }
        let header = RecordHeader::decode(&raw, RecordKind::Feature)?;

        // Committed records are never modified in place, so this handle is a stable snapshot
        let on_disk = file.metadata().await?.len();
        let verified = match header.verify_length(on_disk.saturating_sub(HEADER_LEN as u64)) {
            Ok(()) => {
                let checksum = self.hash_remaining(&mut file).await?;
                header.verify_checksum(checksum)
            }
            Err(e) => Err(e),
        };
        if let Err(e) = verified {
            warn!(path = %path.display(), error = %e, "Feature response failed integrity check");
            return Err(e);
        }

        file.seek(SeekFrom::Start(HEADER_LEN as u64)).await?;
        let body = FeatureBody::new(file.take(header.length), header.length);
        Ok(Some((body, header.meta())))
    }

    async fn hash_remaining(&self, file: &mut File) -> Result<Checksum, StorageError> {
        let mut hasher = blake3::Hasher::new();
        let mut buf = vec![0u8; self.config.copy_buffer_size];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Checksum::from_hasher(&hasher))
    }

    async fn remove_blob(&self, path: &Path) -> Result<bool, StorageError> {
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if self.config.sync_writes
            && let Some(parent) = path.parent()
        {
            walk::sync_dir(parent).await?;
        }
        Ok(true)
    }

    /// Detach a subtree with a single rename so it vanishes atomically
    ///
    /// Returns the subtree's new location, or `None` if it did not exist.
    async fn move_to_trash(&self, dir: &Path) -> Result<Option<PathBuf>, StorageError> {
        let trash = self.layout.trash_dir();
        walk::create_dirs(&trash, self.config.sync_writes).await?;

        let doomed = trash.join(Uuid::new_v4().simple().to_string());
        match fs::rename(dir, &doomed).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        if self.config.sync_writes
            && let Some(parent) = dir.parent()
        {
            walk::sync_dir(parent).await?;
        }
        Ok(Some(doomed))
    }

    /// Detach and purge a subtree, returning how many blobs it held
    async fn delete_subtree(&self, dir: &Path) -> Result<u64, StorageError> {
        match self.move_to_trash(dir).await? {
            Some(doomed) => walk::purge(&doomed).await,
            None => Ok(0),
        }
    }
}

/// Best-effort removal of an abandoned temp file
async fn discard(temp: &Path) {
    if let Err(e) = fs::remove_file(temp).await
        && e.kind() != ErrorKind::NotFound
    {
        warn!(path = %temp.display(), error = %e, "Failed to remove stray file");
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    #[instrument(skip(self, object), fields(blob = %object.blob_id()))]
    async fn put(&self, object: &Descriptor) -> Result<(), StorageError> {
        self.lifecycle.ensure_live()?;
        object.validate()?;

        match object {
            Descriptor::Tile(tile) => {
                let data = tile.blob().ok_or(IdentityError::MissingPayload)?;
                let path = self.layout.tile_path(&tile.id);
                let old_size = if self.listeners.is_empty() {
                    None
                } else {
                    Self::existing_size(&path).await?
                };

                let size = self.commit(&path, RecordKind::Tile, Payload::Bytes(data)).await?;
                trace!(size, "Stored tile");
                self.listeners.tile_put(&tile.id, size, old_size);
            }
            Descriptor::Feature(feature) => {
                let payload = match feature.source().ok_or(IdentityError::MissingPayload)? {
                    FeatureSource::Bytes(data) => Payload::Bytes(data),
                    FeatureSource::File(source) => Payload::File(source),
                };
                let path = self.layout.feature_path(&feature.id);

                let size = self.commit(&path, RecordKind::Feature, payload).await?;
                debug!(size, "Stored feature response");
                self.listeners.notify(|l| l.feature_stored(&feature.id, size));
            }
        }

        Ok(())
    }

    #[instrument(skip(self, object), fields(blob = %object.blob_id()))]
    async fn get(&self, object: &mut Descriptor) -> Result<Option<BlobMeta>, StorageError> {
        self.lifecycle.ensure_live()?;
        object.validate()?;

        match object {
            Descriptor::Tile(tile) => {
                let path = self.layout.tile_path(&tile.id);
                let Some((data, meta)) = self.read_tile(&path).await? else {
                    return Ok(None);
                };
                tile.set_blob(data);
                Ok(Some(meta))
            }
            Descriptor::Feature(feature) => {
                let path = self.layout.feature_path(&feature.id);
                let Some((body, meta)) = self.open_feature(&path).await? else {
                    return Ok(None);
                };
                feature.set_body(body);
                Ok(Some(meta))
            }
        }
    }

    #[instrument(skip(self), fields(blob = %id))]
    async fn delete(&self, id: &BlobId) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        id.validate()?;

        if !self.remove_blob(&self.layout.blob_path(id)).await? {
            return Ok(false);
        }

        trace!("Deleted blob");
        match id {
            BlobId::Tile(tile) => self.listeners.notify(|l| l.tile_deleted(tile)),
            BlobId::Feature(feature) => self.listeners.notify(|l| l.feature_deleted(feature)),
        }
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn delete_layer(&self, layer: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;

        let removed = self.delete_subtree(&self.layout.layer_dir(layer)).await?;
        if removed == 0 {
            debug!("Layer held no blobs");
            return Ok(false);
        }

        info!(removed, "Deleted layer");
        self.listeners.notify(|l| l.layer_deleted(layer));
        Ok(true)
    }

    #[instrument(skip(self, range), fields(layer = %range.layer, grid_set = %range.grid_set))]
    async fn delete_range(&self, range: &TileRange) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        range.validate()?;

        let mut removed = 0u64;
        for (zoom, bounds) in range.levels() {
            if bounds.is_empty() {
                continue;
            }
            let zoom_dir = self.layout.zoom_dir(
                &range.layer,
                &range.grid_set,
                &range.format,
                range.parameters_id,
                zoom,
            );
            removed += walk::delete_tiles(&zoom_dir, zoom, bounds, self.config.sync_writes).await?;
        }
        debug!(removed, "Deleted tile range");

        if removed > 0 {
            self.listeners.notify(|l| l.range_deleted(range));
        }
        Ok(removed > 0)
    }

    #[instrument(skip(self))]
    async fn delete_grid_set(&self, layer: &str, grid_set: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;
        IdentityError::require("grid_set", grid_set)?;

        let removed = self
            .delete_subtree(&self.layout.grid_set_dir(layer, grid_set))
            .await?;
        if removed == 0 {
            debug!("Grid set held no blobs");
            return Ok(false);
        }

        info!(removed, "Deleted grid set");
        self.listeners.notify(|l| l.grid_set_deleted(layer, grid_set));
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn rename_layer(&self, old_name: &str, new_name: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", old_name)?;
        IdentityError::require("layer", new_name)?;

        let old_dir = self.layout.layer_dir(old_name);
        let new_dir = self.layout.layer_dir(new_name);
        if walk::contains_blob(&new_dir).await? {
            return Err(IdentityError::LayerExists(new_name.to_string()).into());
        }
        if !walk::contains_blob(&old_dir).await? {
            return Ok(false);
        }
        // Directories left behind by earlier deletes would block the rename
        self.delete_subtree(&new_dir).await?;

        match fs::rename(&old_dir, &new_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        }
        if self.config.sync_writes {
            walk::sync_dir(self.layout.root()).await?;
        }

        info!("Renamed layer");
        self.listeners.notify(|l| l.layer_renamed(old_name, new_name));
        Ok(true)
    }

    async fn layer_exists(&self, layer: &str) -> Result<bool, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;
        walk::contains_blob(&self.layout.layer_dir(layer)).await
    }

    #[instrument(skip(self), fields(root = %self.layout.root().display()))]
    async fn clear(&self) -> Result<(), StorageError> {
        self.lifecycle.ensure_live()?;

        let mut entries = fs::read_dir(self.layout.root()).await?;
        let mut removed = 0u64;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name() == TRASH_DIR {
                continue;
            }
            if entry.file_type().await?.is_dir() {
                removed += self.delete_subtree(&entry.path()).await?;
            } else {
                // Stray files at the root are not part of any layer
                discard(&entry.path()).await;
            }
        }
        walk::purge(&self.layout.trash_dir()).await?;

        info!(removed, "Cleared file blob store");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn cache_size(&self, layer: &str) -> Result<u64, StorageError> {
        self.lifecycle.ensure_live()?;
        IdentityError::require("layer", layer)?;

        let bytes = walk::payload_bytes(&self.layout.layer_dir(layer)).await?;
        debug!(bytes, "Calculated layer cache size");
        Ok(bytes)
    }

    async fn destroy(&self) {
        if self.lifecycle.destroy() {
            info!(path = %self.layout.root().display(), "File blob store destroyed");
        }
    }

    fn listeners(&self) -> &ListenerList {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tilecache_core::{FeatureId, FeatureObject, TileId, TileObject};

    use crate::error::StorageErrorKind;

    async fn create_test_store() -> (FileBlobStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = FileBlobStoreConfig::new(temp_dir.path().join("cache"));
        let store = FileBlobStore::open(config).await.unwrap();
        (store, temp_dir)
    }

    fn tile(layer: &str, zoom: u32, x: u64, y: u64) -> TileId {
        TileId::new(layer, "EPSG:4326", "image/png", zoom, x, y)
    }

    async fn put_tile(store: &FileBlobStore, id: TileId, data: &[u8]) {
        store
            .put(&TileObject::new(id).with_blob(data.to_vec()).into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_store_and_load() {
        let (store, _temp) = create_test_store().await;
        put_tile(&store, tile("L", 3, 2, 1), b"Hello, tiles!").await;

        let mut desc = Descriptor::from(TileObject::new(tile("L", 3, 2, 1)));
        let meta = store.get(&mut desc).await.unwrap().unwrap();
        assert_eq!(meta.size, 13);
        assert_eq!(meta.checksum, Checksum::of(b"Hello, tiles!"));
        assert_eq!(desc.tile_blob().unwrap().as_ref(), b"Hello, tiles!");

        // No temp files left behind
        let dir = store.blob_path(&tile("L", 3, 2, 1).into());
        let mut entries = fs::read_dir(dir.parent().unwrap()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().into_string().unwrap());
        }
        assert_eq!(names, vec!["2_1.blob".to_string()]);
    }

    #[tokio::test]
    async fn test_open_requires_root_when_configured() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileBlobStoreConfig::new(temp_dir.path().join("missing")).existing_root();
        let err = FileBlobStore::open(config).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NotConfigured);

        let file_root = temp_dir.path().join("plain-file");
        fs::write(&file_root, b"not a dir").await.unwrap();
        let err = FileBlobStore::open(FileBlobStoreConfig::new(&file_root))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_open_rejects_zero_copy_buffer() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = FileBlobStoreConfig::new(temp_dir.path());
        config.copy_buffer_size = 0;
        let err = FileBlobStore::open(config).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_emptied_layer_directories_are_not_a_layer() {
        let (store, _temp) = create_test_store().await;
        put_tile(&store, tile("X", 4, 3, 2), b"gone").await;
        assert!(store.delete(&tile("X", 4, 3, 2).into()).await.unwrap());
        assert!(store.root().join("X").is_dir());

        assert!(!store.layer_exists("X").await.unwrap());
        assert!(!store.delete_layer("X").await.unwrap());

        put_tile(&store, tile("old", 0, 0, 0), b"moved").await;
        assert!(store.rename_layer("old", "X").await.unwrap());
        assert!(store.layer_exists("X").await.unwrap());
        assert_eq!(store.cache_size("X").await.unwrap(), 5);
        assert!(!store.rename_layer("old", "Y").await.unwrap());
    }

    #[tokio::test]
    async fn test_reopen_observes_committed_blobs() {
        let temp_dir = TempDir::new().unwrap();
        let config = FileBlobStoreConfig::new(temp_dir.path());
        {
            let store = FileBlobStore::open(config.clone()).await.unwrap();
            put_tile(&store, tile("L", 0, 0, 0), b"persisted").await;
            store.destroy().await;
        }

        let store = FileBlobStore::open(config).await.unwrap();
        let mut desc = Descriptor::from(TileObject::new(tile("L", 0, 0, 0)));
        assert!(store.get(&mut desc).await.unwrap().is_some());
        assert_eq!(desc.tile_blob().unwrap().as_ref(), b"persisted");
    }

    #[tokio::test]
    async fn test_corruption_detected() {
        let (store, _temp) = create_test_store().await;
        let id = tile("L", 1, 1, 1);
        put_tile(&store, id.clone(), b"Original data").await;

        // Flip a payload byte behind the store's back
        let path = store.blob_path(&id.clone().into());
        let mut raw = fs::read(&path).await.unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        fs::write(&path, &raw).await.unwrap();

        let mut desc = Descriptor::from(TileObject::new(id));
        let err = store.get(&mut desc).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Corruption);
        assert!(desc.tile_blob().is_none());
    }

    #[tokio::test]
    async fn test_truncated_feature_is_corrupt() {
        let (store, _temp) = create_test_store().await;
        let id = FeatureId::new("roads", 9);
        store
            .put(&FeatureObject::new(id.clone())
                .with_source(FeatureSource::Bytes(Bytes::from(vec![7u8; 4096])))
                .into())
            .await
            .unwrap();

        let path = store.blob_path(&id.clone().into());
        let raw = fs::read(&path).await.unwrap();
        fs::write(&path, &raw[..raw.len() - 100]).await.unwrap();

        let mut desc = Descriptor::from(FeatureObject::new(id));
        let err = store.get(&mut desc).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Corruption);
    }

    #[tokio::test]
    async fn test_feature_streamed_from_file() {
        let (store, temp) = create_test_store().await;
        let source = temp.path().join("response.xml");
        let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&source, &payload).await.unwrap();

        let id = FeatureId::new("roads", 42);
        store
            .put(&FeatureObject::new(id.clone())
                .with_source(FeatureSource::File(source))
                .into())
            .await
            .unwrap();

        let mut desc = Descriptor::from(FeatureObject::new(id));
        let meta = store.get(&mut desc).await.unwrap().unwrap();
        assert_eq!(meta.size, payload.len() as u64);
        assert_eq!(meta.checksum, Checksum::of(&payload));

        let body = desc.as_feature_mut().unwrap().take_body().unwrap();
        assert_eq!(body.into_bytes().await.unwrap().as_ref(), &payload[..]);
    }

    #[tokio::test]
    async fn test_missing_feature_source_is_io_error() {
        let (store, temp) = create_test_store().await;
        let object = FeatureObject::new(FeatureId::new("roads", 1))
            .with_source(FeatureSource::File(temp.path().join("nope")));
        let err = store.put(&object.into()).await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::Io);
    }

    #[tokio::test]
    async fn test_trash_purged_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let trash = temp_dir.path().join(TRASH_DIR).join("leftover");
        fs::create_dir_all(&trash).await.unwrap();
        fs::write(trash.join("0_0.blob"), [0u8; HEADER_LEN]).await.unwrap();

        let _store = FileBlobStore::open(FileBlobStoreConfig::new(temp_dir.path()))
            .await
            .unwrap();
        assert!(!temp_dir.path().join(TRASH_DIR).exists());
    }

    #[tokio::test]
    async fn test_rename_and_grid_set_delete() {
        let (store, _temp) = create_test_store().await;
        put_tile(&store, tile("old", 0, 0, 0), b"a").await;
        let mut mercator = tile("old", 0, 0, 0);
        mercator.grid_set = "EPSG:900913".to_string();
        put_tile(&store, mercator.clone(), b"bb").await;

        assert!(store.rename_layer("old", "new").await.unwrap());
        assert!(!store.layer_exists("old").await.unwrap());
        assert!(store.layer_exists("new").await.unwrap());
        assert_eq!(store.cache_size("new").await.unwrap(), 3);

        assert!(store.delete_grid_set("new", "EPSG:900913").await.unwrap());
        assert!(!store.delete_grid_set("new", "EPSG:900913").await.unwrap());
        assert_eq!(store.cache_size("new").await.unwrap(), 1);

        put_tile(&store, tile("other", 0, 0, 0), b"c").await;
        let err = store.rename_layer("new", "other").await.unwrap_err();
        assert_eq!(err.kind(), StorageErrorKind::InvalidIdentity);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let (store, _temp) = create_test_store().await;
        put_tile(&store, tile("A", 0, 0, 0), b"a").await;
        put_tile(&store, tile("B", 0, 0, 0), b"b").await;

        store.clear().await.unwrap();
        assert!(!store.layer_exists("A").await.unwrap());
        assert!(!store.layer_exists("B").await.unwrap());

        let mut entries = fs::read_dir(store.root()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }
}
