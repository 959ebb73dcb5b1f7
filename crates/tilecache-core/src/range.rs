//! Tile range selectors
//!
//! A [`TileRange`] names a rectangle of tile indices per zoom level within a
//! single (layer, grid set, format, parameters) combination. It is used for
//! bulk deletion.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;
use crate::identity::TileId;

/// Inclusive rectangle of tile indices at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBounds {
    pub min_x: u64,
    pub min_y: u64,
    pub max_x: u64,
    pub max_y: u64,
}

impl TileBounds {
    /// Create bounds from inclusive corners
    pub fn new(min_x: u64, min_y: u64, max_x: u64, max_y: u64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Bounds matching every tile at a zoom level
    pub fn all() -> Self {
        Self::new(0, 0, u64::MAX, u64::MAX)
    }

    /// Check whether a tile index lies inside the bounds
    pub fn contains(&self, x: u64, y: u64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check whether another inclusive rectangle overlaps these bounds
    pub fn intersects(&self, other: &TileBounds) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }
}

/// Rectangular selection of tiles across zoom levels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRange {
    pub layer: String,
    pub grid_set: String,
    pub format: String,
    pub parameters_id: u64,
    /// Bounds per zoom level; zoom levels absent from the map are not matched
    levels: BTreeMap<u32, TileBounds>,
}

impl TileRange {
    /// Create a range with no zoom levels selected
    pub fn new(
        layer: impl Into<String>,
        grid_set: impl Into<String>,
        format: impl Into<String>,
        parameters_id: u64,
    ) -> Self {
        Self {
            layer: layer.into(),
            grid_set: grid_set.into(),
            format: format.into(),
            parameters_id,
            levels: BTreeMap::new(),
        }
    }

    /// Select a rectangle at a zoom level, replacing any previous selection
    pub fn with_level(mut self, zoom: u32, bounds: TileBounds) -> Self {
        self.levels.insert(zoom, bounds);
        self
    }

    /// Select every tile in each zoom level of `zooms`
    pub fn with_levels(mut self, zooms: impl IntoIterator<Item = u32>) -> Self {
        for zoom in zooms {
            self.levels.insert(zoom, TileBounds::all());
        }
        self
    }

    /// Selected zoom levels with their bounds, ascending
    pub fn levels(&self) -> impl Iterator<Item = (u32, &TileBounds)> {
        self.levels.iter().map(|(zoom, bounds)| (*zoom, bounds))
    }

    /// Bounds selected at a zoom level
    pub fn bounds(&self, zoom: u32) -> Option<&TileBounds> {
        self.levels.get(&zoom)
    }

    /// Check whether a tile identity is selected by this range
    pub fn contains(&self, id: &TileId) -> bool {
        id.layer == self.layer
            && id.grid_set == self.grid_set
            && id.format == self.format
            && id.parameters_id == self.parameters_id
            && self
                .levels
                .get(&id.zoom)
                .is_some_and(|bounds| bounds.contains(id.x, id.y))
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        IdentityError::require("layer", &self.layer)?;
        IdentityError::require("grid_set", &self.grid_set)?;
        IdentityError::require("format", &self.format)?;
        if self.levels.is_empty() {
            return Err(IdentityError::EmptyRange);
        }
        Ok(())
    }
}
