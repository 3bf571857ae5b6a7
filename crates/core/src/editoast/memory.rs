//! In-memory editoast for tests and offline replays.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use serde_json::Value;
use track_view_map::prelude::*;

use super::{
    ApiError, ApiFuture, EditoastApi, PathProperties, Result, TrainPath, TrainProjection,
    TrainSchedulePage, Validate,
};

/// Canned editoast responses.
///
/// Tiles nobody registered come back empty. Everything else that is missing
/// is reported as [`ApiError::NotFound`].
#[derive(Debug, Default)]
pub struct StaticEditoast {
    tiles: HashMap<(String, TileIndex), Bytes>,
    pages: Vec<TrainSchedulePage>,
    paths: HashMap<TrainId, TrainPath>,
    geometries: HashMap<String, PathProperties>,
    projections: HashMap<TrainId, TrainProjection>,
    latency: Option<Duration>,
    requests: Mutex<Vec<String>>,
}

impl StaticEditoast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tile(mut self, layer: &str, tile: TileIndex, bytes: impl Into<Bytes>) -> Self {
        self.tiles.insert((layer.to_string(), tile), bytes.into());
        self
    }

    /// Appends a page. Pages are numbered from 1 in insertion order.
    pub fn with_schedule_page(mut self, page: TrainSchedulePage) -> Self {
        self.pages.push(page);
        self
    }

    pub fn with_path(mut self, train: TrainId, path: TrainPath) -> Self {
        self.paths.insert(train, path);
        self
    }

    /// Geometry served for exactly these track section ranges.
    pub fn with_geometry(mut self, track_section_ranges: &[Value], geometry: PathProperties) -> Self {
        self.geometries.insert(ranges_key(track_section_ranges), geometry);
        self
    }

    pub fn with_projection(mut self, train: TrainId, projection: TrainProjection) -> Self {
        self.projections.insert(train, projection);
        self
    }

    /// Delays every response, to keep requests in flight.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Requests served so far, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|log| log.clone()).unwrap_or_default()
    }

    fn record(&self, request: String) {
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
    }

    async fn respond<T: Clone>(&self, request: String, found: Option<&T>) -> Result<T> {
        self.record(request.clone());
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        found.cloned().ok_or(ApiError::NotFound(request))
    }
}

fn ranges_key(track_section_ranges: &[Value]) -> String {
    Value::Array(track_section_ranges.to_vec()).to_string()
}

impl EditoastApi for StaticEditoast {
    fn track_tile<'a>(&'a self, layer: &'a str, tile: TileIndex) -> ApiFuture<'a, Bytes> {
        async move {
            let found = self.tiles.get(&(layer.to_string(), tile));
            let empty = Bytes::new();
            self.respond(format!("tile {layer} {tile}"), Some(found.unwrap_or(&empty)))
                .await
        }
        .boxed()
    }

    fn train_schedules(&self, page: u32) -> ApiFuture<'_, TrainSchedulePage> {
        async move {
            let found = (page as usize).checked_sub(1).and_then(|i| self.pages.get(i));
            self.respond(format!("schedules page {page}"), found).await?.validate()
        }
        .boxed()
    }

    fn train_path(&self, train: TrainId) -> ApiFuture<'_, TrainPath> {
        async move {
            self.respond(format!("path {train}"), self.paths.get(&train))
                .await?
                .validate()
        }
        .boxed()
    }

    fn path_geometry<'a>(&'a self, track_section_ranges: &'a [Value]) -> ApiFuture<'a, PathProperties> {
        async move {
            let key = ranges_key(track_section_ranges);
            let found = self.geometries.get(&key);
            self.respond(format!("geometry {key}"), found).await?.validate()
        }
        .boxed()
    }

    fn project_path<'a>(&'a self, train: TrainId, _path: &'a TrainPath) -> ApiFuture<'a, TrainProjection> {
        async move {
            self.respond(format!("projection {train}"), self.projections.get(&train))
                .await?
                .validate()
        }
        .boxed()
    }
}
