//! Per-train geometry and occupancy, fetched and shaped for the scene.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use glam::DVec2;
use tracing::debug;
use track_view_map::prelude::*;

use super::occupancy::{OccupancyBlock, occupancy_blocks};
use super::schedule::ScheduleEntry;
use super::view::{BlockView, TimeScale};
use super::{Result, TrajectoryError};
use crate::editoast::{ApiError, EditoastApi, TrainPath};

/// Simplification tolerance as a share of the tile size.
pub const SIMPLIFY_TOLERANCE: f64 = 0.005;

/// Everything needed to draw one train.
#[derive(Debug, Clone)]
pub struct TrainTrajectory {
    pub id: TrainId,
    pub departure: DateTime<Utc>,
    pub path: Arc<TrainPath>,
    /// Simplified path on the session plane.
    pub geo_points: Vec<DVec2>,
    pub blocks: Vec<OccupancyBlock>,
}

impl TrainTrajectory {
    pub fn block_views(&self, scale: &TimeScale) -> Result<Vec<BlockView>> {
        self.blocks
            .iter()
            .map(|block| BlockView::render(&self.geo_points, block, scale).map_err(TrajectoryError::from))
            .collect()
    }
}

/// Paths fetched during a session, one request per train at most.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: Mutex<HashMap<TrainId, Arc<TrainPath>>>,
}

impl PathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, train: TrainId) -> Option<Arc<TrainPath>> {
        self.paths.lock().ok()?.get(&train).cloned()
    }

    pub fn len(&self) -> usize {
        self.paths.lock().map(|paths| paths.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached path of `train`, fetched on first use.
    pub async fn get_or_fetch(&self, api: &dyn EditoastApi, train: TrainId) -> std::result::Result<Arc<TrainPath>, ApiError> {
        if let Some(path) = self.get(train) {
            return Ok(path);
        }

        let path = Arc::new(api.train_path(train).await?);
        if let Ok(mut paths) = self.paths.lock() {
            // A concurrent fetch may have won; keep its copy
            return Ok(paths.entry(train).or_insert(path).clone());
        }
        Ok(path)
    }
}

/// Builds [`TrainTrajectory`]s on a fixed plane.
#[derive(Clone)]
pub struct TrajectoryBuilder {
    api: Arc<dyn EditoastApi>,
    plane: TilePlane,
    paths: Arc<PathCache>,
}

impl TrajectoryBuilder {
    pub fn new(api: Arc<dyn EditoastApi>, plane: TilePlane, paths: Arc<PathCache>) -> Self {
        Self { api, plane, paths }
    }

    pub async fn load_path(&self, train: TrainId) -> Result<Arc<TrainPath>> {
        Ok(self.paths.get_or_fetch(self.api.as_ref(), train).await?)
    }

    /// Path geometry projected on the plane and simplified.
    pub async fn compute_geo_points(&self, path: &TrainPath) -> Result<Vec<DVec2>> {
        let properties = self.api.path_geometry(&path.track_section_ranges).await?;

        let projected: Vec<DVec2> = properties.points().map(|point| self.plane.project(point)).collect();
        let simplified = simplify(&projected, SIMPLIFY_TOLERANCE * self.plane.tile_size());

        if simplified.len() < 2 || path_length(&simplified) <= 0.0 {
            return Err(TrajectoryError::EmptyGeometry(simplified.len()));
        }

        debug!(
            raw = projected.len(),
            kept = simplified.len(),
            "simplified path geometry"
        );
        Ok(simplified)
    }

    pub async fn compute_occupancy_blocks(
        &self,
        train: TrainId,
        path: &TrainPath,
        time_origin: DateTime<Utc>,
    ) -> Result<Vec<OccupancyBlock>> {
        let projection = self.api.project_path(train, path).await?;
        occupancy_blocks(&projection, path.length, time_origin)
    }

    /// Loads the path, then geometry and occupancy side by side.
    pub async fn build(&self, entry: ScheduleEntry, time_origin: DateTime<Utc>) -> Result<TrainTrajectory> {
        let path = self.load_path(entry.id).await?;

        let (geo_points, blocks) = tokio::try_join!(
            self.compute_geo_points(&path),
            self.compute_occupancy_blocks(entry.id, &path, time_origin),
        )?;

        debug!(train = %entry.id, blocks = blocks.len(), "built train trajectory");
        Ok(TrainTrajectory {
            id: entry.id,
            departure: entry.departure,
            path,
            geo_points,
            blocks,
        })
    }
}
