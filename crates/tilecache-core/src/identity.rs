//! Blob identities
//!
//! Every blob the store manages is named by one of two identity families:
//!
//! - [`TileId`]: layer, grid set, zoom, column, row, format and parameter hash
//! - [`FeatureId`]: a caller-assigned numeric id scoped to a layer
//!
//! [`BlobId`] is the tagged union of both, used wherever an operation only
//! needs to know *which* blob rather than its payload.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Identity of a single map tile
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    /// Name of the layer the tile belongs to
    pub layer: String,
    /// Grid set (CRS plus tiling scheme), e.g. `EPSG:4326`
    pub grid_set: String,
    /// Zoom level
    pub zoom: u32,
    /// Column index
    pub x: u64,
    /// Row index
    pub y: u64,
    /// MIME format, e.g. `image/png`
    pub format: String,
    /// Hash of the request parameters; 0 for the default parameter set
    pub parameters_id: u64,
}

impl TileId {
    /// Create a tile identity with the default parameter set
    pub fn new(
        layer: impl Into<String>,
        grid_set: impl Into<String>,
        format: impl Into<String>,
        zoom: u32,
        x: u64,
        y: u64,
    ) -> Self {
        Self {
            layer: layer.into(),
            grid_set: grid_set.into(),
            zoom,
            x,
            y,
            format: format.into(),
            parameters_id: 0,
        }
    }

    /// Set the parameter hash
    pub fn with_parameters_id(mut self, parameters_id: u64) -> Self {
        self.parameters_id = parameters_id;
        self
    }

    /// Check that every string component is populated
    pub fn validate(&self) -> Result<(), IdentityError> {
        IdentityError::require("layer", &self.layer)?;
        IdentityError::require("grid_set", &self.grid_set)?;
        IdentityError::require("format", &self.format)
    }
}

impl Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}.{}#{:x}",
            self.layer, self.grid_set, self.zoom, self.x, self.y, self.format, self.parameters_id
        )
    }
}

/// Identity of a cached feature-service response
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId {
    /// Layer the response was captured for
    pub layer: String,
    /// Caller-assigned response id
    pub id: u64,
}

impl FeatureId {
    pub fn new(layer: impl Into<String>, id: u64) -> Self {
        Self {
            layer: layer.into(),
            id,
        }
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        IdentityError::require("layer", &self.layer)
    }
}

impl Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/feature/{}", self.layer, self.id)
    }
}

/// Identity of any blob in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobId {
    Tile(TileId),
    Feature(FeatureId),
}

impl BlobId {
    /// Layer the blob belongs to
    pub fn layer(&self) -> &str {
        match self {
            BlobId::Tile(id) => &id.layer,
            BlobId::Feature(id) => &id.layer,
        }
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        match self {
            BlobId::Tile(id) => id.validate(),
            BlobId::Feature(id) => id.validate(),
        }
    }
}

impl From<TileId> for BlobId {
    fn from(id: TileId) -> Self {
        BlobId::Tile(id)
    }
}

impl From<FeatureId> for BlobId {
    fn from(id: FeatureId) -> Self {
        BlobId::Feature(id)
    }
}

impl Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobId::Tile(id) => id.fmt(f),
            BlobId::Feature(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn states_tile() -> TileId {
        TileId::new("topp:states", "EPSG:4326", "image/png", 3, 2, 1)
    }

    #[test]
    fn test_equal_tuples_are_equal_identities() {
        let mut seen = HashSet::new();
        seen.insert(BlobId::from(states_tile()));
        assert!(seen.contains(&BlobId::from(states_tile())));

        // Any differing component yields a distinct identity
        assert!(!seen.contains(&BlobId::from(states_tile().with_parameters_id(7))));
        let mut other = states_tile();
        other.format = "image/jpeg".to_string();
        assert!(!seen.contains(&BlobId::from(other)));
    }

    #[test]
    fn test_tile_and_feature_never_collide() {
        let tile = BlobId::from(TileId::new("L", "g", "f", 0, 0, 0));
        let feature = BlobId::from(FeatureId::new("L", 0));
        assert_ne!(tile, feature);
        assert_eq!(tile.layer(), feature.layer());
    }

    #[test]
    fn test_validate_missing_fields() {
        let mut id = states_tile();
        assert!(id.validate().is_ok());

        id.grid_set.clear();
        assert_eq!(id.validate(), Err(IdentityError::MissingField("grid_set")));

        let feature = FeatureId::new("", 42);
        assert_eq!(
            BlobId::from(feature).validate(),
            Err(IdentityError::MissingField("layer"))
        );
    }

    #[test]
    fn test_display() {
        let display = states_tile().to_string();
        assert!(display.starts_with("topp:states/EPSG:4326/3/2/1"));
        assert_eq!(FeatureId::new("roads", 42).to_string(), "roads/feature/42");
    }
}
