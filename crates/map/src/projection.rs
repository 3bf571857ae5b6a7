//! Web-Mercator tile math.
//!
//! Tile coordinates follow the slippy-map convention: `x` grows eastwards from
//! the antimeridian, `y` grows southwards from the top of the projection, and a
//! zoom level `z` splits the world into `2^z` tiles per axis. Fractional tile
//! coordinates are kept as `f64` so callers can locate a point inside a tile.

use std::f64::consts::PI;

use geo::{Coord, Point};

use crate::tile::TileBounds;

/// Deepest zoom level accepted by the projection functions.
pub const MAX_ZOOM: u8 = 30;

/// Number of tiles along one axis at `zoom`.
pub fn tiles_per_axis(zoom: u8) -> f64 {
    assert!(zoom <= MAX_ZOOM, "zoom level {zoom} is out of range");
    (1u64 << zoom) as f64
}

/// Fractional tile coordinates of a lon/lat point (degrees).
///
/// The latitude must stay away from the poles, where the projection diverges.
pub fn lon_lat_to_tile(point: Point, zoom: u8) -> Coord {
    let n = tiles_per_axis(zoom);
    let lat_rad = point.y().to_radians();

    let x = (point.x() + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

    Coord { x, y }
}

/// Inverse of [`lon_lat_to_tile`]. Accepts fractional tile coordinates.
pub fn tile_to_lon_lat(zoom: u8, tile: Coord) -> Point {
    let n = tiles_per_axis(zoom);

    let lon = tile.x / n * 360.0 - 180.0;
    let lat = tile_y_to_lat(tile.y, n);

    Point::new(lon, lat)
}

/// Edges, in degrees, of the integer tile `(x, y)` at `zoom`.
pub fn tile_bounds(zoom: u8, x: u32, y: u32) -> TileBounds {
    let n = tiles_per_axis(zoom);

    TileBounds {
        lon_left: x as f64 / n * 360.0 - 180.0,
        lon_right: (x as f64 + 1.0) / n * 360.0 - 180.0,
        lat_top: tile_y_to_lat(y as f64, n),
        lat_bottom: tile_y_to_lat(y as f64 + 1.0, n),
    }
}

fn tile_y_to_lat(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}
