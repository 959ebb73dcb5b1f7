//! # Tilecache Core
//!
//! Identity and descriptor types shared by every tilecache blob store.
//!
//! ## Key Types
//!
//! - [`TileId`] / [`FeatureId`] / [`BlobId`]: identities of stored blobs
//! - [`TileObject`] / [`FeatureObject`] / [`Descriptor`]: identity plus payload slot
//! - [`TileRange`]: rectangular tile selection for bulk deletion
//! - [`IdentityError`]: descriptor validation failures

pub mod error;
pub mod identity;
pub mod object;
pub mod range;

// Re-export main types
pub use error::*;
pub use identity::*;
pub use object::*;
pub use range::*;
