//! Configuration for the file blob store

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for [`FileBlobStore`](super::FileBlobStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBlobStoreConfig {
    /// Storage root; every blob lives below it
    pub root: PathBuf,
    /// Create the root when missing instead of failing with `NotConfigured`
    pub create_root: bool,
    /// fsync files and their parent directories before reporting success
    pub sync_writes: bool,
    /// Chunk size used when streaming feature responses
    pub copy_buffer_size: usize,
}

impl Default for FileBlobStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./data/tilecache"),
            create_root: true,
            sync_writes: true,
            copy_buffer_size: 64 * 1024, // 64KB
        }
    }
}

impl FileBlobStoreConfig {
    /// Default configuration rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Require the root to exist already
    pub fn existing_root(mut self) -> Self {
        self.create_root = false;
        self
    }

    /// Toggle fsync on commit (durability vs throughput)
    pub fn with_sync_writes(mut self, sync_writes: bool) -> Self {
        self.sync_writes = sync_writes;
        self
    }

    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size.max(1);
        self
    }
}
