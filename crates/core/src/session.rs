//! Mutable state of one viewing session.
//!
//! A session is bound to a zoom level. Tile indices, plane coordinates and
//! in-flight requests only mean something at that zoom, so changing it starts
//! a new generation and drops everything tied to the previous one.

use std::collections::HashMap;
use std::sync::Arc;

use geo::Point;
use glam::DVec2;
use tracing::{debug, info, warn};
use track_view_map::prelude::*;

use crate::settings::Settings;
use crate::train::{PathCache, ScheduleEntry, TrainEvent, TrainPicker, TrainSchedule, TrainState};

/// A tile to fetch, stamped with the generation that asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub tile: TileIndex,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainRequest {
    pub entry: ScheduleEntry,
    pub generation: u64,
}

#[derive(Debug)]
pub struct MapSession {
    plane: TilePlane,
    viewer: DVec2,
    tiles: LoadedTileSet,
    sight_distance: u32,
    generation: u64,
    picker: TrainPicker,
    trains: HashMap<TrainId, TrainState>,
    paths: Arc<PathCache>,
}

impl MapSession {
    /// Session whose plane origin and viewer sit on `start`.
    pub fn new(start: Point, zoom: u8, tile_size: f64, sight_distance: u32) -> Self {
        let plane = TilePlane::centered_on(start, zoom, tile_size);

        Self {
            plane,
            viewer: plane.project(start),
            tiles: LoadedTileSet::new(zoom),
            sight_distance,
            generation: 0,
            picker: TrainPicker::new(),
            trains: HashMap::new(),
            paths: Arc::new(PathCache::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.start_position(),
            settings.start_zoom_level,
            settings.tile_size,
            settings.tile_sight_distance,
        )
    }

    pub fn plane(&self) -> TilePlane {
        self.plane
    }

    pub fn zoom(&self) -> u8 {
        self.plane.zoom()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn tiles(&self) -> &LoadedTileSet {
        &self.tiles
    }

    pub fn paths(&self) -> Arc<PathCache> {
        self.paths.clone()
    }

    pub fn viewer_position(&self) -> DVec2 {
        self.viewer
    }

    pub fn viewer_lon_lat(&self) -> Point {
        self.plane.unproject(self.viewer)
    }

    /// Moves the viewer on the plane.
    pub fn move_to(&mut self, position: DVec2) {
        self.viewer = position;
    }

    /// Tile under the viewer, centre of the ring search.
    pub fn reference_tile(&self) -> TileIndex {
        self.plane.tile_at(self.viewer)
    }

    /// Claims the nearest tile not requested yet, if any is in sight.
    pub fn next_tile_request(&mut self) -> Option<TileRequest> {
        let tile = self.tiles.claim_next(self.reference_tile(), self.sight_distance)?;
        debug!(%tile, generation = self.generation, "claimed tile");

        Some(TileRequest {
            tile,
            generation: self.generation,
        })
    }

    /// Switches zoom level by `delta`, keeping the viewer over the same place.
    ///
    /// Returns `false`, and changes nothing, when the clamped zoom is the
    /// current one.
    pub fn change_zoom(&mut self, delta: i32) -> bool {
        let zoom = (self.zoom() as i32 + delta).clamp(0, MAX_ZOOM as i32) as u8;
        if zoom == self.zoom() {
            return false;
        }

        let position = self.viewer_lon_lat();
        self.plane = TilePlane::centered_on(position, zoom, self.plane.tile_size());
        self.viewer = self.plane.project(position);
        self.reset();

        info!(zoom, generation = self.generation, "changed zoom level");
        true
    }

    /// Drops every tile and train of the current generation.
    pub fn reset(&mut self) {
        self.tiles.reset(self.plane.zoom());
        self.picker.reset();
        self.trains.clear();
        self.paths = Arc::new(PathCache::new());
        self.generation += 1;
    }

    /// Next train to build, earliest departure first.
    pub fn next_train_request(&mut self, schedule: &TrainSchedule) -> Option<TrainRequest> {
        let entry = self.picker.pick(schedule)?;

        let state = TrainState::Created
            .advance(TrainEvent::PathRequested)
            .unwrap_or(TrainState::Discarded);
        self.trains.insert(entry.id, state);

        Some(TrainRequest {
            entry,
            generation: self.generation,
        })
    }

    pub fn train_state(&self, train: TrainId) -> Option<TrainState> {
        self.trains.get(&train).copied()
    }

    /// Applies `events` to a train of the current generation.
    ///
    /// Returns the new state, or `None` when the train belongs to another
    /// generation or was never requested.
    pub fn record_train(&mut self, generation: u64, train: TrainId, events: &[TrainEvent]) -> Option<TrainState> {
        if !self.is_current(generation) {
            return None;
        }

        let state = self.trains.get_mut(&train)?;
        for &event in events {
            match state.advance(event) {
                Ok(next) => *state = next,
                Err(error) => {
                    warn!(%train, %error, "ignoring train event");
                    return Some(*state);
                }
            }
        }
        Some(*state)
    }

    pub fn rendered_trains(&self) -> usize {
        self.trains.values().filter(|state| state.is_renderable()).count()
    }
}
