//! # track-view-map
//!
//! Pure geospatial engine behind the railway viewer: turns lon/lat into tile
//! indices and scene-plane coordinates, picks the next tile to stream, decodes
//! vector-tile track geometry and reshapes polylines.
//!
//! Nothing in this crate performs I/O. Fetching tiles and train data is the
//! job of `track-view-core`.
//!
//! ## Example
//!
//! ```
//! use track_view_map::prelude::*;
//! use geo::Point;
//!
//! let start = Point::new(-0.4015937, 49.5327827);
//! let plane = TilePlane::centered_on(start, 11, 15.0);
//!
//! let mut tiles = LoadedTileSet::new(plane.zoom());
//! let reference = plane.tile_at(glam::DVec2::ZERO);
//!
//! // The tile under the viewer is always claimed first.
//! let first = tiles.claim_next(reference, 2).unwrap();
//! assert_eq!(first, reference);
//! assert!(tiles.contains(&first));
//! ```

pub mod identifiers;
pub mod mvt;
pub mod plane;
pub mod polyline;
pub mod projection;
pub mod search;
pub mod tile;

pub mod prelude {
    pub use crate::identifiers::*;
    pub use crate::mvt::{TRACK_SECTIONS_LAYER, TileDecodeError, TrackFeature, decode_track_tile};
    pub use crate::plane::{TilePlane, to_world};
    pub use crate::polyline::{SliceError, path_length, simplify, slice};
    pub use crate::projection::{MAX_ZOOM, lon_lat_to_tile, tile_bounds, tile_to_lon_lat};
    pub use crate::search::LoadedTileSet;
    pub use crate::tile::{TileBounds, TileIndex};
}

pub use prelude::*;
