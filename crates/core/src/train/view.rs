//! Presentation of occupancy blocks in the scene.
//!
//! Blocks stand on the part of the path they occupy and rise along the height
//! axis from their start time to their end time. The time axis is a pure view
//! transform: changing it re-renders blocks without touching them.

use glam::{DVec2, DVec3};
use track_view_map::prelude::*;

use super::occupancy::{OccupancyBlock, Rgb};

/// Mapping from schedule seconds to scene height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    pub seconds_per_unit: f64,
    /// Height of the time origin.
    pub offset: f64,
}

impl TimeScale {
    pub fn new(seconds_per_unit: f64) -> Self {
        assert!(seconds_per_unit > 0.0, "time scale must be positive, got {seconds_per_unit}");
        Self {
            seconds_per_unit,
            offset: 0.0,
        }
    }

    pub fn height(&self, seconds: f64) -> f64 {
        seconds / self.seconds_per_unit + self.offset
    }

    /// Multiplies the seconds per unit by `factor`, shrinking every height by
    /// the same factor. `0.5` zooms in and `2.0` zooms out.
    pub fn rescale(&mut self, factor: f64) {
        assert!(factor > 0.0, "rescale factor must be positive, got {factor}");
        self.offset /= factor;
        self.seconds_per_unit *= factor;
    }

    /// Moves the whole time axis up by `delta` units.
    pub fn scroll(&mut self, delta: f64) {
        self.offset += delta;
    }
}

/// A block laid out in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockView {
    /// Plane footprint of the occupied path section.
    pub footprint: Vec<DVec2>,
    pub bottom: f64,
    pub top: f64,
    pub color: Rgb,
}

impl BlockView {
    pub fn render(geo_points: &[DVec2], block: &OccupancyBlock, scale: &TimeScale) -> Result<Self, SliceError> {
        let footprint = slice(geo_points, block.start_offset, block.end_offset)?;

        Ok(Self {
            footprint,
            bottom: scale.height(block.start_time),
            top: scale.height(block.end_time),
            color: block.color,
        })
    }

    /// Lower and upper edges of the block wall in scene space.
    pub fn edges(&self) -> (Vec<DVec3>, Vec<DVec3>) {
        let at = |height: f64| -> Vec<DVec3> {
            self.footprint
                .iter()
                .map(|&point| to_world(point, height))
                .collect()
        };
        (at(self.bottom), at(self.top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn block() -> OccupancyBlock {
        OccupancyBlock {
            start_time: 400.0,
            end_time: 800.0,
            start_offset: 0.25,
            end_offset: 0.75,
            color: Rgb::from_packed(0x00FF00),
        }
    }

    #[test]
    fn test_height() {
        let scale = TimeScale::new(200.0);
        assert_relative_eq!(scale.height(400.0), 2.0);
    }

    #[test]
    fn test_rescale_and_scroll() {
        let mut scale = TimeScale::new(200.0);
        scale.scroll(3.0);
        assert_relative_eq!(scale.height(400.0), 5.0);

        // Zooming in halves the seconds per unit, doubling every height
        scale.rescale(0.5);
        assert_relative_eq!(scale.seconds_per_unit, 100.0);
        assert_relative_eq!(scale.offset, 6.0);
        assert_relative_eq!(scale.height(400.0), 10.0);

        scale.rescale(2.0);
        assert_relative_eq!(scale.height(400.0), 5.0);
    }

    #[test]
    fn test_render_block() {
        let path = vec![DVec2::new(0.0, 0.0), DVec2::new(100.0, 0.0)];
        let block = block();
        let view = BlockView::render(&path, &block, &TimeScale::new(200.0)).unwrap();

        assert_eq!(view.footprint, vec![DVec2::new(25.0, 0.0), DVec2::new(75.0, 0.0)]);
        assert_relative_eq!(view.bottom, 2.0);
        assert_relative_eq!(view.top, 4.0);

        let (lower, upper) = view.edges();
        assert_eq!(lower[1], DVec3::new(75.0, 2.0, 0.0));
        assert_eq!(upper[0], DVec3::new(25.0, 4.0, 0.0));
    }

    #[test]
    fn test_rescaling_leaves_blocks_alone() {
        let path = vec![DVec2::new(0.0, 0.0), DVec2::new(0.0, 10.0)];
        let block = block();
        let mut scale = TimeScale::new(200.0);

        let before = BlockView::render(&path, &block, &scale).unwrap();
        scale.rescale(2.0);
        let after = BlockView::render(&path, &block, &scale).unwrap();

        assert_eq!(block, self::block());
        assert_eq!(before.footprint, after.footprint);
        assert_relative_eq!(after.top, before.top / 2.0);
    }

    #[test]
    fn test_degenerate_path() {
        let result = BlockView::render(&[DVec2::ZERO], &block(), &TimeScale::new(1.0));
        assert_eq!(result, Err(SliceError::TooFewPoints(1)));
    }
}
