//! Local scene plane anchored on an origin tile.
//!
//! The plane is laid out in tile units scaled by `tile_size`: the origin tile's
//! north-west corner sits at `(0, tile_size)` and its south-west corner at
//! `(0, 0)`. Plane `x` grows eastwards and plane `y` grows northwards, which is
//! the opposite sense of tile-pixel `y`.

use geo::{Coord, Point};
use glam::{DVec2, DVec3};

use crate::projection::{lon_lat_to_tile, tile_to_lon_lat, tiles_per_axis};
use crate::tile::TileIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePlane {
    origin: TileIndex,
    tile_size: f64,
}

impl TilePlane {
    pub fn new(origin: TileIndex, tile_size: f64) -> Self {
        assert!(tile_size > 0.0, "tile size must be positive, got {tile_size}");
        Self { origin, tile_size }
    }

    /// Plane whose origin tile contains `point`.
    pub fn centered_on(point: Point, zoom: u8, tile_size: f64) -> Self {
        Self::new(TileIndex::containing(point, zoom), tile_size)
    }

    pub fn origin(&self) -> TileIndex {
        self.origin
    }

    pub fn zoom(&self) -> u8 {
        self.origin.zoom
    }

    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Plane position of the south-west corner of `index`.
    pub fn tile_origin(&self, index: TileIndex) -> DVec2 {
        debug_assert_eq!(index.zoom, self.origin.zoom);
        DVec2::new(
            self.tile_size * (index.x as f64 - self.origin.x as f64),
            -self.tile_size * (index.y as f64 - self.origin.y as f64),
        )
    }

    /// Maps a pixel of a tile (`0..extent` per axis, `y` down) onto the plane.
    pub fn pixel_to_plane(&self, index: TileIndex, pixel: DVec2, extent: f64) -> DVec2 {
        pixel_to_plane(self.tile_origin(index), pixel, extent, self.tile_size)
    }

    pub fn project(&self, point: Point) -> DVec2 {
        let tile = lon_lat_to_tile(point, self.zoom());
        DVec2::new(
            self.tile_size * (tile.x - self.origin.x as f64),
            -self.tile_size * (tile.y - self.origin.y as f64 - 1.0),
        )
    }

    pub fn unproject(&self, position: DVec2) -> Point {
        tile_to_lon_lat(self.zoom(), self.fractional_tile(position))
    }

    /// Tile under a plane position, clamped to the map.
    pub fn tile_at(&self, position: DVec2) -> TileIndex {
        let tile = self.fractional_tile(position);
        let max = tiles_per_axis(self.zoom()) - 1.0;

        TileIndex {
            zoom: self.zoom(),
            x: tile.x.floor().clamp(0.0, max) as u32,
            y: tile.y.floor().clamp(0.0, max) as u32,
        }
    }

    fn fractional_tile(&self, position: DVec2) -> Coord {
        Coord {
            x: self.origin.x as f64 + position.x / self.tile_size,
            y: self.origin.y as f64 + 1.0 - position.y / self.tile_size,
        }
    }
}

/// Places a tile pixel on the plane given the tile's south-west corner.
///
/// Pixel `y` grows downwards inside a tile while plane `y` grows upwards.
pub fn pixel_to_plane(tile_origin: DVec2, pixel: DVec2, extent: f64, tile_size: f64) -> DVec2 {
    DVec2::new(
        tile_origin.x + pixel.x / extent * tile_size,
        tile_origin.y + tile_size * (1.0 - pixel.y / extent),
    )
}

/// Lifts a plane position to scene space, `y` being the height axis.
pub fn to_world(position: DVec2, height: f64) -> DVec3 {
    DVec3::new(position.x, height, position.y)
}
