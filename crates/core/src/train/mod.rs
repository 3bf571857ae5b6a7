//! Trains: which ones to show, and what to show for each.

pub mod occupancy;
pub mod schedule;
pub mod state;
pub mod trajectory;
pub mod view;

use track_view_map::prelude::*;

use crate::editoast::ApiError;

pub use occupancy::{OccupancyBlock, Rgb};
pub use schedule::{ScheduleEntry, TrainPicker, TrainSchedule, load_schedule};
pub use state::{InvalidTransition, TrainEvent, TrainState};
pub use trajectory::{PathCache, TrainTrajectory, TrajectoryBuilder};
pub use view::{BlockView, TimeScale};

#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("path geometry collapsed to {0} point(s)")]
    EmptyGeometry(usize),

    #[error("signal update {index} is malformed: {reason}")]
    MalformedSignalUpdate { index: usize, reason: String },

    #[error(transparent)]
    Slice(#[from] SliceError),
}

pub type Result<T> = std::result::Result<T, TrajectoryError>;
