//! Planar polyline operations.
//!
//! Polylines are plain `[DVec2]` slices in scene-plane units. Point order is the
//! direction of travel.

pub mod simplify;
pub mod slice;

use glam::DVec2;

pub use simplify::simplify;
pub use slice::{MIN_POINT_SPACING, SliceError, slice};

/// Sum of the segment lengths.
pub fn path_length(points: &[DVec2]) -> f64 {
    points.windows(2).map(|w| w[0].distance(w[1])).sum()
}
