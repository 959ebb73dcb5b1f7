//! On-disk layout of the file blob store
//!
//! ```text
//! <root>/
//!   .trash/                                  scopes being deleted
//!   <layer>/
//!     tiles/<grid set>/<format>/<params>/<zoom>/<hx>_<hy>/<x>_<y>.blob
//!     features/<shard>/<id>.blob
//! ```
//!
//! String components are percent-encoded so the mapping from identity to path
//! is injective. Tiles of one zoom level are grouped into half-cell
//! directories so no single directory grows with the square of the zoom.

use std::path::{Path, PathBuf};

use tilecache_core::{BlobId, FeatureId, TileBounds, TileId};
use uuid::Uuid;

pub(crate) const TRASH_DIR: &str = ".trash";
pub(crate) const TILES_DIR: &str = "tiles";
pub(crate) const FEATURES_DIR: &str = "features";
pub(crate) const BLOB_SUFFIX: &str = ".blob";

/// Encoded names longer than this are replaced by a digest
const MAX_COMPONENT_LEN: usize = 200;

/// Encode a string identity component as a single path segment
///
/// Never yields an empty name, a name starting with `.`, or a name
/// containing a separator.
pub fn encode_component(value: &str) -> String {
    let encoded = urlencoding::encode(value);
    let encoded = match encoded.strip_prefix('.') {
        Some(rest) => format!("%2E{rest}"),
        None => encoded.into_owned(),
    };

    if encoded.is_empty() || encoded.len() > MAX_COMPONENT_LEN {
        // '+' is always percent-encoded above, so digests cannot collide with plain names
        format!("+{}", blake3::hash(value.as_bytes()).to_hex())
    } else {
        encoded
    }
}

/// Edge length, in tiles, of a half-cell directory at a zoom level
pub fn half_cell_size(zoom: u32) -> u64 {
    1u64.checked_shl(zoom / 2 + 1).unwrap_or(u64::MAX)
}

/// Tile indices covered by a half-cell directory
pub fn half_cell_bounds(zoom: u32, hx: u64, hy: u64) -> TileBounds {
    let size = half_cell_size(zoom);
    let min_x = hx.saturating_mul(size);
    let min_y = hy.saturating_mul(size);
    TileBounds::new(
        min_x,
        min_y,
        min_x.saturating_add(size - 1),
        min_y.saturating_add(size - 1),
    )
}

/// Parse an `<a>_<b>` name
pub fn parse_pair(name: &str) -> Option<(u64, u64)> {
    let (a, b) = name.split_once('_')?;
    Some((a.parse().ok()?, b.parse().ok()?))
}

/// Parse the tile indices out of an `<x>_<y>.blob` file name
pub fn parse_tile_file_name(name: &str) -> Option<(u64, u64)> {
    parse_pair(name.strip_suffix(BLOB_SUFFIX)?)
}

/// Whether a directory entry is a committed blob (not a temp file)
pub fn is_blob_file(name: &str) -> bool {
    name.ends_with(BLOB_SUFFIX) && !name.starts_with('.')
}

/// Unique sibling path used to stage a write to `target`
pub fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("blob");
    target.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
}

/// Maps identities to paths below a storage root
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.root.join(TRASH_DIR)
    }

    pub fn layer_dir(&self, layer: &str) -> PathBuf {
        self.root.join(encode_component(layer))
    }

    pub fn grid_set_dir(&self, layer: &str, grid_set: &str) -> PathBuf {
        let mut path = self.layer_dir(layer);
        path.push(TILES_DIR);
        path.push(encode_component(grid_set));
        path
    }

    /// Directory holding one zoom level of one (grid set, format, parameters) combination
    pub fn zoom_dir(
        &self,
        layer: &str,
        grid_set: &str,
        format: &str,
        parameters_id: u64,
        zoom: u32,
    ) -> PathBuf {
        let mut path = self.grid_set_dir(layer, grid_set);
        path.push(encode_component(format));
        path.push(format!("{:016x}", parameters_id));
        path.push(format!("{:02}", zoom));
        path
    }

    pub fn tile_path(&self, id: &TileId) -> PathBuf {
        let size = half_cell_size(id.zoom);
        let mut path = self.zoom_dir(&id.layer, &id.grid_set, &id.format, id.parameters_id, id.zoom);
        path.push(format!("{}_{}", id.x / size, id.y / size));
        path.push(format!("{}_{}{}", id.x, id.y, BLOB_SUFFIX));
        path
    }

    pub fn feature_path(&self, id: &FeatureId) -> PathBuf {
        let mut path = self.layer_dir(&id.layer);
        path.push(FEATURES_DIR);
        path.push(format!("{:02x}", id.id & 0xff));
        path.push(format!("{:016x}{}", id.id, BLOB_SUFFIX));
        path
    }

    pub fn blob_path(&self, id: &BlobId) -> PathBuf {
        match id {
            BlobId::Tile(tile) => self.tile_path(tile),
            BlobId::Feature(feature) => self.feature_path(feature),
        }
    }
}
