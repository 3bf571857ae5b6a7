use std::fmt;

use geo::Point;

use crate::projection::{MAX_ZOOM, lon_lat_to_tile, tile_bounds, tiles_per_axis};

/// Discrete address of a square region of the projected map.
///
/// Indices only mean something relative to their zoom level: the same `(x, y)`
/// names a different region at every zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileIndex {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    pub const WORLD: TileIndex = TileIndex { zoom: 0, x: 0, y: 0 };

    /// Builds an index, checking `zoom <= MAX_ZOOM` and `0 <= x, y < 2^zoom`.
    pub fn new(zoom: u8, x: u32, y: u32) -> Option<Self> {
        if zoom > MAX_ZOOM {
            return None;
        }

        let n = tiles_per_axis(zoom);
        if (x as f64) < n && (y as f64) < n {
            Some(Self { zoom, x, y })
        } else {
            None
        }
    }

    /// The tile containing a lon/lat point.
    pub fn containing(point: Point, zoom: u8) -> Self {
        let tile = lon_lat_to_tile(point, zoom);
        let max = tiles_per_axis(zoom) - 1.0;

        Self {
            zoom,
            x: tile.x.floor().clamp(0.0, max) as u32,
            y: tile.y.floor().clamp(0.0, max) as u32,
        }
    }

    /// Neighbour at a signed offset, or `None` when it falls off the map.
    pub fn offset(&self, dx: i64, dy: i64) -> Option<Self> {
        let x = u32::try_from(self.x as i64 + dx).ok()?;
        let y = u32::try_from(self.y as i64 + dy).ok()?;
        Self::new(self.zoom, x, y)
    }

    pub fn bounds(&self) -> TileBounds {
        tile_bounds(self.zoom, self.x, self.y)
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Geographic edges of a tile, in degrees.
///
/// `lat_top` is the northern edge. Always derived from a [`TileIndex`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBounds {
    pub lon_left: f64,
    pub lon_right: f64,
    pub lat_top: f64,
    pub lat_bottom: f64,
}

impl TileBounds {
    /// `[min_lon, min_lat, max_lon, max_lat]`, the order static map APIs expect.
    pub fn bbox(&self) -> [f64; 4] {
        [self.lon_left, self.lat_bottom, self.lon_right, self.lat_top]
    }

    pub fn contains(&self, point: Point) -> bool {
        (self.lon_left..=self.lon_right).contains(&point.x())
            && (self.lat_bottom..=self.lat_top).contains(&point.y())
    }
}
