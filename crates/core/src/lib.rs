//! # track-view-core
//!
//! Asynchronous side of the railway viewer. Pulls track tiles, timetables,
//! train paths and signal occupancy from editoast and turns them into scene
//! data on a [`TilePlane`](track_view_map::TilePlane).
//!
//! The [`viewer::Viewer`] loop is the usual entry point; the pieces it is made
//! of ([`session::MapSession`], [`train::TrajectoryBuilder`],
//! [`train::load_schedule`]) can also be driven by hand.

pub mod editoast;
pub mod session;
pub mod settings;
pub mod tiles;
pub mod train;
pub mod viewer;

// Re-export the geospatial engine
pub use track_view_map as map;

pub mod prelude {
    pub use crate::editoast::{ApiError, EditoastApi, HttpEditoast, StaticEditoast};
    pub use crate::session::{MapSession, TileRequest, TrainRequest};
    pub use crate::settings::{Settings, SettingsError};
    pub use crate::tiles::{TileLoadError, load_track_tile};
    pub use crate::train::{
        BlockView, OccupancyBlock, Rgb, ScheduleEntry, TimeScale, TrainSchedule, TrainState,
        TrainTrajectory, TrajectoryBuilder, TrajectoryError, load_schedule,
    };
    pub use crate::viewer::{SceneEvent, Viewer, ViewerCommand, ViewerHandle};
}
