//! Cacheable objects handed to a blob store
//!
//! Descriptors carry a fully resolved identity plus a payload slot. The store
//! reads the slot on put and fills it on get; nothing else on the descriptor is
//! touched.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use crate::error::IdentityError;
use crate::identity::{BlobId, FeatureId, TileId};

/// A map tile and its payload slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileObject {
    pub id: TileId,
    blob: Option<Bytes>,
}

impl TileObject {
    /// Create a tile descriptor with an empty payload slot
    pub fn new(id: TileId) -> Self {
        Self { id, blob: None }
    }

    /// Attach a payload for storing
    pub fn with_blob(mut self, blob: impl Into<Bytes>) -> Self {
        self.blob = Some(blob.into());
        self
    }

    /// The payload slot; `Some(empty)` is a stored empty tile, `None` means unset
    pub fn blob(&self) -> Option<&Bytes> {
        self.blob.as_ref()
    }

    pub fn set_blob(&mut self, blob: Bytes) {
        self.blob = Some(blob);
    }

    pub fn take_blob(&mut self) -> Option<Bytes> {
        self.blob.take()
    }
}

/// Where a feature response payload is read from on put
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureSource {
    /// Payload already held in memory
    Bytes(Bytes),
    /// Payload streamed from a file the caller owns
    File(PathBuf),
}

/// Readable handle over a stored feature response
///
/// Filled in by a store on get. The caller drains it to obtain the payload.
pub struct FeatureBody {
    reader: Pin<Box<dyn AsyncRead + Send + Sync>>,
    length: u64,
}

impl FeatureBody {
    pub fn new<R>(reader: R, length: u64) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self {
            reader: Box::pin(reader),
            length,
        }
    }

    /// Length of the payload in bytes
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Drain the handle into memory
    pub async fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut data = Vec::with_capacity(self.length as usize);
        self.read_to_end(&mut data).await?;
        Ok(Bytes::from(data))
    }
}

impl AsyncRead for FeatureBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for FeatureBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureBody")
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// A captured feature-service response
#[derive(Debug)]
pub struct FeatureObject {
    pub id: FeatureId,
    source: Option<FeatureSource>,
    body: Option<FeatureBody>,
}

impl FeatureObject {
    pub fn new(id: FeatureId) -> Self {
        Self {
            id,
            source: None,
            body: None,
        }
    }

    /// Attach a payload source for storing
    pub fn with_source(mut self, source: FeatureSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn source(&self) -> Option<&FeatureSource> {
        self.source.as_ref()
    }

    /// Side channel filled in by get
    pub fn body(&self) -> Option<&FeatureBody> {
        self.body.as_ref()
    }

    pub fn set_body(&mut self, body: FeatureBody) {
        self.body = Some(body);
    }

    pub fn take_body(&mut self) -> Option<FeatureBody> {
        self.body.take()
    }
}

/// Any cacheable object a store accepts
#[derive(Debug)]
pub enum Descriptor {
    Tile(TileObject),
    Feature(FeatureObject),
}

impl Descriptor {
    /// Identity of the blob this descriptor names
    pub fn blob_id(&self) -> BlobId {
        match self {
            Descriptor::Tile(tile) => BlobId::Tile(tile.id.clone()),
            Descriptor::Feature(feature) => BlobId::Feature(feature.id.clone()),
        }
    }

    pub fn layer(&self) -> &str {
        match self {
            Descriptor::Tile(tile) => &tile.id.layer,
            Descriptor::Feature(feature) => &feature.id.layer,
        }
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        match self {
            Descriptor::Tile(tile) => tile.id.validate(),
            Descriptor::Feature(feature) => feature.id.validate(),
        }
    }

    pub fn as_tile(&self) -> Option<&TileObject> {
        match self {
            Descriptor::Tile(tile) => Some(tile),
            Descriptor::Feature(_) => None,
        }
    }

    pub fn as_feature_mut(&mut self) -> Option<&mut FeatureObject> {
        match self {
            Descriptor::Feature(feature) => Some(feature),
            Descriptor::Tile(_) => None,
        }
    }

    /// Payload slot of a tile descriptor
    pub fn tile_blob(&self) -> Option<&Bytes> {
        self.as_tile().and_then(TileObject::blob)
    }
}

impl From<TileObject> for Descriptor {
    fn from(tile: TileObject) -> Self {
        Descriptor::Tile(tile)
    }
}

impl From<FeatureObject> for Descriptor {
    fn from(feature: FeatureObject) -> Self {
        Descriptor::Feature(feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_blob_slot() {
        let id = TileId::new("L", "EPSG:4326", "image/png", 0, 0, 0);
        let mut tile = TileObject::new(id);
        assert!(tile.blob().is_none());

        tile.set_blob(Bytes::new());
        assert_eq!(tile.blob().map(Bytes::len), Some(0));
        assert_eq!(tile.take_blob(), Some(Bytes::new()));
        assert!(tile.blob().is_none());
    }

    #[test]
    fn test_descriptor_dispatch() {
        let tile = TileObject::new(TileId::new("A", "g", "f", 1, 2, 3)).with_blob(&b"abc"[..]);
        let desc = Descriptor::from(tile);
        assert_eq!(desc.layer(), "A");
        assert_eq!(desc.tile_blob().map(|b| &b[..]), Some(&b"abc"[..]));
        assert!(matches!(desc.blob_id(), BlobId::Tile(_)));

        let mut desc = Descriptor::from(FeatureObject::new(FeatureId::new("B", 42)));
        assert_eq!(desc.layer(), "B");
        assert!(desc.tile_blob().is_none());
        assert!(desc.as_feature_mut().is_some());
    }

    #[tokio::test]
    async fn test_feature_body_drains() {
        let payload = Bytes::from_static(b"feature collection");
        let body = FeatureBody::new(std::io::Cursor::new(payload.clone()), payload.len() as u64);
        assert_eq!(body.len(), payload.len() as u64);
        assert_eq!(body.into_bytes().await.unwrap(), payload);
    }
}
