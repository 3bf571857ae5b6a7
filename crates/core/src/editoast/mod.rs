//! Boundary to the editoast service.
//!
//! Everything the viewer needs from the outside world goes through
//! [`EditoastApi`]: [`HttpEditoast`] talks to a live server and
//! [`StaticEditoast`] serves canned data from memory.

pub mod http;
pub mod memory;
pub mod types;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde_json::Value;
use track_view_map::prelude::*;

pub use http::HttpEditoast;
pub use memory::StaticEditoast;
pub use types::{
    PathProperties, SignalUpdate, TrainPath, TrainProjection, TrainSchedulePage,
    TrainScheduleSummary, Validate,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid editoast url: {0}")]
    InvalidUrl(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Data sources of a viewer session.
///
/// Returned payloads are already validated.
pub trait EditoastApi: Send + Sync {
    /// Raw vector tile of `layer`. Empty when the server has no data there.
    fn track_tile<'a>(&'a self, layer: &'a str, tile: TileIndex) -> ApiFuture<'a, Bytes>;

    /// One page of the timetable's train schedules, the first page being 1.
    fn train_schedules(&self, page: u32) -> ApiFuture<'_, TrainSchedulePage>;

    fn train_path(&self, train: TrainId) -> ApiFuture<'_, TrainPath>;

    /// Lon/lat geometry covering `track_section_ranges`.
    fn path_geometry<'a>(&'a self, track_section_ranges: &'a [Value]) -> ApiFuture<'a, PathProperties>;

    /// Space-time projection of `train` along its own path.
    fn project_path<'a>(&'a self, train: TrainId, path: &'a TrainPath) -> ApiFuture<'a, TrainProjection>;
}
