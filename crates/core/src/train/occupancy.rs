//! Signal block occupancy, normalised for display.

use chrono::{DateTime, Utc};

use super::{Result, TrajectoryError};
use crate::editoast::{SignalUpdate, TrainProjection};

/// Colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Unpacks `0xRRGGBB`. Bits above the low 24 are ignored.
    pub fn from_packed(color: u32) -> Self {
        let channel = |shift: u32| ((color >> shift) & 0xff) as f32 / 255.0;
        Self {
            r: channel(16),
            g: channel(8),
            b: channel(0),
        }
    }

    pub fn to_hex(self) -> String {
        let channel = |value: f32| (value * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Part of the path a train holds during a time interval.
///
/// Times are seconds from the session's time origin, offsets are fractions of
/// the path length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OccupancyBlock {
    pub start_time: f64,
    pub end_time: f64,
    pub start_offset: f64,
    pub end_offset: f64,
    pub color: Rgb,
}

impl OccupancyBlock {
    /// `departure_delta_ms` is the train's departure minus the time origin.
    pub fn from_signal_update(
        update: &SignalUpdate,
        path_length: u64,
        departure_delta_ms: i64,
    ) -> std::result::Result<Self, String> {
        assert!(path_length > 0, "path length must be positive");

        update.check()?;
        if update.position_end > path_length {
            return Err(format!(
                "position {} is past the path end {path_length}",
                update.position_end
            ));
        }

        let seconds = |ms: i64| (ms + departure_delta_ms) as f64 / 1000.0;
        let fraction = |position: u64| position as f64 / path_length as f64;

        Ok(Self {
            start_time: seconds(update.time_start),
            end_time: seconds(update.time_end),
            start_offset: fraction(update.position_start),
            end_offset: fraction(update.position_end),
            color: Rgb::from_packed(update.color),
        })
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Every signal update of `projection` as a block, by ascending start time.
pub fn occupancy_blocks(
    projection: &TrainProjection,
    path_length: u64,
    time_origin: DateTime<Utc>,
) -> Result<Vec<OccupancyBlock>> {
    let departure_delta_ms = (projection.departure_time - time_origin).num_milliseconds();

    let mut blocks = projection
        .signal_updates
        .iter()
        .enumerate()
        .map(|(index, update)| {
            OccupancyBlock::from_signal_update(update, path_length, departure_delta_ms)
                .map_err(|reason| TrajectoryError::MalformedSignalUpdate { index, reason })
        })
        .collect::<Result<Vec<_>>>()?;

    blocks.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(blocks)
}
