//! The streaming loop driving a [`MapSession`].
//!
//! Every tick the viewer claims at most one tile and one train, and fetches
//! them in the background. Results come back through [`SceneEvent`]s; those
//! from a previous zoom level are dropped on arrival.
//!
//! A train loads its path first, then its geometry and occupancy side by
//! side. Each of the two records its own [`TrainEvent`] as it lands, and the
//! train is shown once both are in.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use glam::DVec2;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use track_view_map::prelude::*;

use crate::editoast::{ApiError, EditoastApi, TrainPath};
use crate::session::{MapSession, TileRequest, TrainRequest};
use crate::settings::Settings;
use crate::tiles::{TileLoadError, load_track_tile};
use crate::train::{
    OccupancyBlock, ScheduleEntry, TrainEvent, TrainSchedule, TrainTrajectory, TrajectoryBuilder, TrajectoryError,
    load_schedule,
};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerCommand {
    /// Moves the viewer to a position on the current plane.
    MoveTo(DVec2),
    ChangeZoom(i32),
    Shutdown,
}

#[derive(Debug)]
pub enum SceneEvent {
    TileLoaded {
        tile: TileIndex,
        /// South-west corner of the tile on the plane.
        tile_origin: DVec2,
        features: Vec<TrackFeature>,
    },
    TrainReady(Box<TrainTrajectory>),
    TrainDiscarded {
        train: TrainId,
        reason: String,
    },
    /// Everything shown so far is obsolete; positions now refer to `plane`.
    SessionReset {
        plane: TilePlane,
        viewer: DVec2,
    },
}

/// Sends commands to a running [`Viewer`].
#[derive(Debug, Clone)]
pub struct ViewerHandle {
    commands: mpsc::Sender<ViewerCommand>,
}

impl ViewerHandle {
    /// Returns `false` once the viewer has stopped.
    pub async fn send(&self, command: ViewerCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub async fn move_to(&self, position: DVec2) -> bool {
        self.send(ViewerCommand::MoveTo(position)).await
    }

    pub async fn change_zoom(&self, delta: i32) -> bool {
        self.send(ViewerCommand::ChangeZoom(delta)).await
    }

    pub async fn shutdown(&self) -> bool {
        self.send(ViewerCommand::Shutdown).await
    }
}

struct TileOutcome {
    request: TileRequest,
    result: Result<Vec<TrackFeature>, TileLoadError>,
}

enum TrainStage {
    Path(Result<Arc<TrainPath>, TrajectoryError>),
    Geometry(Result<Vec<DVec2>, TrajectoryError>),
    Occupancy(Result<Vec<OccupancyBlock>, TrajectoryError>),
}

struct TrainOutcome {
    request: TrainRequest,
    stage: TrainStage,
}

/// What has arrived so far for a train still loading.
struct PendingTrain {
    time_origin: DateTime<Utc>,
    path: Option<Arc<TrainPath>>,
    geo_points: Option<Vec<DVec2>>,
    blocks: Option<Vec<OccupancyBlock>>,
}

impl PendingTrain {
    fn new(time_origin: DateTime<Utc>) -> Self {
        Self {
            time_origin,
            path: None,
            geo_points: None,
            blocks: None,
        }
    }

    fn complete(self, entry: ScheduleEntry) -> Option<TrainTrajectory> {
        Some(TrainTrajectory {
            id: entry.id,
            departure: entry.departure,
            path: self.path?,
            geo_points: self.geo_points?,
            blocks: self.blocks?,
        })
    }
}

pub struct Viewer {
    api: Arc<dyn EditoastApi>,
    session: MapSession,
    layer: String,
    tick: Duration,
    schedule: Option<Arc<TrainSchedule>>,
    pending: HashMap<TrainId, PendingTrain>,
    commands: mpsc::Receiver<ViewerCommand>,
    events: mpsc::Sender<SceneEvent>,
}

impl Viewer {
    pub fn new(api: Arc<dyn EditoastApi>, settings: &Settings) -> (Self, ViewerHandle, mpsc::Receiver<SceneEvent>) {
        let (command_tx, command_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);

        let viewer = Self {
            api,
            session: MapSession::from_settings(settings),
            layer: settings.track_layer.clone(),
            tick: settings.tick_interval(),
            schedule: None,
            pending: HashMap::new(),
            commands: command_rx,
            events: event_tx,
        };

        (viewer, ViewerHandle { commands: command_tx }, event_rx)
    }

    pub fn session(&self) -> &MapSession {
        &self.session
    }

    /// Runs until shut down, every handle is dropped, or the event receiver
    /// goes away. Returns the final session.
    pub async fn run(mut self) -> MapSession {
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut schedule_task = JoinSet::new();
        let api = self.api.clone();
        schedule_task.spawn(async move { load_schedule(api.as_ref()).await });

        let mut tiles: JoinSet<TileOutcome> = JoinSet::new();
        let mut trains: JoinSet<TrainOutcome> = JoinSet::new();

        info!(
            zoom = self.session.zoom(),
            origin = %self.session.plane().origin(),
            "viewer started"
        );

        loop {
            let running = tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch(&mut tiles, &mut trains);
                    true
                }
                Some(joined) = schedule_task.join_next() => {
                    self.accept_schedule(joined);
                    true
                }
                Some(joined) = tiles.join_next() => match joined {
                    Ok(outcome) => self.accept_tile(outcome).await,
                    Err(error) => log_join_error(&error, "tile"),
                },
                Some(joined) = trains.join_next() => match joined {
                    Ok(outcome) => self.accept_train(outcome, &mut trains).await,
                    Err(error) => log_join_error(&error, "train"),
                },
                command = self.commands.recv() => match command {
                    Some(ViewerCommand::MoveTo(position)) => {
                        self.session.move_to(position);
                        true
                    }
                    Some(ViewerCommand::ChangeZoom(delta)) => {
                        self.change_zoom(delta, &mut tiles, &mut trains).await
                    }
                    Some(ViewerCommand::Shutdown) | None => false,
                },
            };

            if !running {
                break;
            }
        }

        schedule_task.abort_all();
        tiles.abort_all();
        trains.abort_all();
        info!(
            tiles = self.session.tiles().len(),
            trains = self.session.rendered_trains(),
            "viewer stopped"
        );
        self.session
    }

    fn dispatch(&mut self, tiles: &mut JoinSet<TileOutcome>, trains: &mut JoinSet<TrainOutcome>) {
        if let Some(request) = self.session.next_tile_request() {
            let api = self.api.clone();
            let layer = self.layer.clone();
            tiles.spawn(async move {
                let result = load_track_tile(api.as_ref(), &layer, request.tile).await;
                TileOutcome { request, result }
            });
        }

        let Some(schedule) = self.schedule.clone() else {
            return;
        };
        let Some(time_origin) = schedule.time_origin() else {
            return;
        };

        if let Some(request) = self.session.next_train_request(&schedule) {
            self.pending.insert(request.entry.id, PendingTrain::new(time_origin));
            let builder = self.builder();
            trains.spawn(async move {
                let stage = TrainStage::Path(builder.load_path(request.entry.id).await);
                TrainOutcome { request, stage }
            });
        }
    }

    fn builder(&self) -> TrajectoryBuilder {
        TrajectoryBuilder::new(self.api.clone(), self.session.plane(), self.session.paths())
    }

    async fn change_zoom(
        &mut self,
        delta: i32,
        tiles: &mut JoinSet<TileOutcome>,
        trains: &mut JoinSet<TrainOutcome>,
    ) -> bool {
        if !self.session.change_zoom(delta) {
            return true;
        }

        tiles.abort_all();
        trains.abort_all();
        self.pending.clear();
        self.emit(SceneEvent::SessionReset {
            plane: self.session.plane(),
            viewer: self.session.viewer_position(),
        })
        .await
    }

    fn accept_schedule(&mut self, joined: Result<Result<TrainSchedule, ApiError>, JoinError>) {
        match joined {
            Ok(Ok(schedule)) => self.schedule = Some(Arc::new(schedule)),
            Ok(Err(error)) => warn!(%error, "train schedule unavailable, showing tracks only"),
            Err(error) => {
                log_join_error(&error, "schedule");
            }
        }
    }

    async fn accept_tile(&mut self, outcome: TileOutcome) -> bool {
        let TileOutcome { request, result } = outcome;
        if !self.session.is_current(request.generation) {
            debug!(tile = %request.tile, generation = request.generation, "dropping stale tile");
            return true;
        }

        match result {
            Ok(features) => {
                let tile_origin = self.session.plane().tile_origin(request.tile);
                self.emit(SceneEvent::TileLoaded {
                    tile: request.tile,
                    tile_origin,
                    features,
                })
                .await
            }
            Err(error) => {
                // The tile stays claimed; it is not retried in this session
                warn!(tile = %request.tile, %error, "skipping tile");
                true
            }
        }
    }

    async fn accept_train(&mut self, outcome: TrainOutcome, trains: &mut JoinSet<TrainOutcome>) -> bool {
        let TrainOutcome { request, stage } = outcome;
        let train = request.entry.id;
        if !self.session.is_current(request.generation) {
            debug!(%train, generation = request.generation, "dropping stale train");
            return true;
        }
        let Some(pending) = self.pending.get_mut(&train) else {
            debug!(%train, "train already discarded");
            return true;
        };

        let event = match stage {
            TrainStage::Path(Ok(path)) => {
                pending.path = Some(path.clone());
                let time_origin = pending.time_origin;
                self.spawn_loads(request, path, time_origin, trains);
                return true;
            }
            TrainStage::Geometry(Ok(geo_points)) => {
                pending.geo_points = Some(geo_points);
                TrainEvent::GeometryLoaded
            }
            TrainStage::Occupancy(Ok(blocks)) => {
                pending.blocks = Some(blocks);
                TrainEvent::OccupancyLoaded
            }
            TrainStage::Path(Err(error)) | TrainStage::Geometry(Err(error)) | TrainStage::Occupancy(Err(error)) => {
                return self.discard_train(request, error).await;
            }
        };

        let Some(state) = self.session.record_train(request.generation, train, &[event]) else {
            return true;
        };
        if !state.is_renderable() {
            debug!(%train, %state, "train partially loaded");
            return true;
        }

        match self.pending.remove(&train).and_then(|pending| pending.complete(request.entry)) {
            Some(trajectory) => {
                debug!(%train, blocks = trajectory.blocks.len(), "train ready");
                self.emit(SceneEvent::TrainReady(Box::new(trajectory))).await
            }
            None => true,
        }
    }

    /// Starts geometry and occupancy of a train whose path is known.
    fn spawn_loads(
        &self,
        request: TrainRequest,
        path: Arc<TrainPath>,
        time_origin: DateTime<Utc>,
        trains: &mut JoinSet<TrainOutcome>,
    ) {
        let builder = self.builder();
        let geometry = builder.clone();
        let geometry_path = path.clone();
        trains.spawn(async move {
            let stage = TrainStage::Geometry(geometry.compute_geo_points(&geometry_path).await);
            TrainOutcome { request, stage }
        });

        trains.spawn(async move {
            let blocks = builder
                .compute_occupancy_blocks(request.entry.id, &path, time_origin)
                .await;
            TrainOutcome {
                request,
                stage: TrainStage::Occupancy(blocks),
            }
        });
    }

    async fn discard_train(&mut self, request: TrainRequest, error: TrajectoryError) -> bool {
        let train = request.entry.id;
        self.pending.remove(&train);
        if self
            .session
            .record_train(request.generation, train, &[TrainEvent::Failed])
            .is_none()
        {
            return true;
        }

        warn!(%train, %error, "discarding train");
        self.emit(SceneEvent::TrainDiscarded {
            train,
            reason: error.to_string(),
        })
        .await
    }

    /// Returns `false` when nobody listens anymore.
    async fn emit(&self, event: SceneEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}

fn log_join_error(error: &JoinError, task: &str) -> bool {
    if error.is_cancelled() {
        debug!(task, "task cancelled");
    } else {
        warn!(task, %error, "task panicked");
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editoast::{
        PathProperties, SignalUpdate, StaticEditoast, TrainPath, TrainProjection, TrainSchedulePage,
        TrainScheduleSummary,
    };
    use crate::train::TrainState;
    use chrono::TimeZone;
    use geo::Point;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;
    use track_view_map::mvt::proto::tile::{Feature, Layer, Value};
    use track_view_map::mvt::proto::{Message, Tile};

    fn settings() -> Settings {
        Settings {
            tile_sight_distance: 0,
            tick_interval_ms: 5,
            ..Settings::default()
        }
    }

    /// One horizontal line across the top of the tile.
    fn track_tile(id: &str) -> Vec<u8> {
        Tile {
            layers: vec![Layer {
                version: 2,
                name: TRACK_SECTIONS_LAYER.to_string(),
                features: vec![Feature {
                    id: None,
                    tags: vec![0, 0],
                    r#type: Some(2),
                    // MoveTo(0, 0) LineTo(4096, 0)
                    geometry: vec![9, 0, 0, 10, 8192, 0],
                }],
                keys: vec!["id".to_string()],
                values: vec![Value {
                    string_value: Some(id.to_string()),
                    ..Default::default()
                }],
                extent: None,
            }],
        }
        .encode_to_vec()
    }

    fn with_train(api: StaticEditoast, id: i64, projected: bool) -> StaticEditoast {
        let departure = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();
        let path = TrainPath {
            track_section_ranges: vec![json!({ "track_section": format!("T{id}") })],
            blocks: Vec::new(),
            routes: Vec::new(),
            length: 1000,
        };
        let geometry = PathProperties::from_points(&[Point::new(-0.41, 49.53), Point::new(-0.39, 49.53)]);

        let api = api
            .with_schedule_page(TrainSchedulePage {
                results: vec![TrainScheduleSummary {
                    id: TrainId(id),
                    start_time: departure,
                }],
                next: None,
            })
            .with_geometry(&path.track_section_ranges, geometry)
            .with_path(TrainId(id), path);

        if !projected {
            return api;
        }
        api.with_projection(
            TrainId(id),
            TrainProjection {
                departure_time: departure,
                signal_updates: vec![SignalUpdate {
                    time_start: 0,
                    time_end: 5000,
                    position_start: 0,
                    position_end: 500,
                    color: 0x00FF00,
                }],
            },
        )
    }

    async fn next_event(events: &mut mpsc::Receiver<SceneEvent>) -> SceneEvent {
        time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("no scene event in time")
            .expect("viewer stopped")
    }

    #[tokio::test]
    async fn test_streams_tiles_and_trains() {
        let settings = settings();
        let reference = MapSession::from_settings(&settings).reference_tile();
        let api = with_train(
            StaticEditoast::new().with_tile(TRACK_SECTIONS_LAYER, reference, track_tile("TA0")),
            1,
            true,
        );

        let (viewer, handle, mut events) = Viewer::new(Arc::new(api), &settings);
        let running = tokio::spawn(viewer.run());

        let mut tile = None;
        let mut train = None;
        while tile.is_none() || train.is_none() {
            match next_event(&mut events).await {
                SceneEvent::TileLoaded { tile: index, tile_origin, features } => {
                    tile = Some((index, tile_origin, features));
                }
                SceneEvent::TrainReady(trajectory) => train = Some(trajectory),
                other => panic!("unexpected event {other:?}"),
            }
        }

        let (index, tile_origin, features) = tile.unwrap();
        assert_eq!(index, reference);
        assert_eq!(tile_origin, DVec2::ZERO);
        assert_eq!(features[0].id.as_str(), "TA0");

        let train = train.unwrap();
        assert_eq!(train.id, TrainId(1));
        assert_eq!(train.geo_points.len(), 2);
        assert_eq!(train.blocks.len(), 1);

        assert!(handle.shutdown().await);
        let session = running.await.unwrap();
        assert_eq!(session.rendered_trains(), 1);
        assert_eq!(session.tiles().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_train_is_discarded() {
        let api = with_train(StaticEditoast::new(), 4, false);
        let (viewer, handle, mut events) = Viewer::new(Arc::new(api), &settings());
        let running = tokio::spawn(viewer.run());

        loop {
            match next_event(&mut events).await {
                SceneEvent::TrainDiscarded { train, .. } => {
                    assert_eq!(train, TrainId(4));
                    break;
                }
                SceneEvent::TileLoaded { .. } => {}
                other => panic!("unexpected event {other:?}"),
            }
        }

        handle.shutdown().await;
        let session = running.await.unwrap();
        assert_eq!(session.rendered_trains(), 0);
    }

    #[tokio::test]
    async fn test_zoom_change_drops_stale_tiles() {
        let api = StaticEditoast::new().with_latency(Duration::from_millis(200));
        let (viewer, handle, mut events) = Viewer::new(Arc::new(api), &settings());
        let running = tokio::spawn(viewer.run());

        assert!(handle.change_zoom(1).await);

        let mut reset = false;
        loop {
            match next_event(&mut events).await {
                SceneEvent::SessionReset { plane, .. } => {
                    assert_eq!(plane.zoom(), 12);
                    reset = true;
                }
                SceneEvent::TileLoaded { tile, .. } => {
                    assert!(reset);
                    assert_eq!(tile.zoom, 12);
                    break;
                }
                other => panic!("unexpected event {other:?}"),
            }
        }

        handle.shutdown().await;
        let session = running.await.unwrap();
        assert_eq!(session.generation(), 1);
    }

    async fn viewer_with_schedule(api: StaticEditoast) -> (Viewer, mpsc::Receiver<SceneEvent>) {
        let (mut viewer, _handle, events) = Viewer::new(Arc::new(api), &settings());
        let schedule = load_schedule(viewer.api.as_ref()).await.unwrap();
        viewer.schedule = Some(Arc::new(schedule));
        (viewer, events)
    }

    #[tokio::test]
    async fn test_train_states_follow_each_load() {
        let (mut viewer, mut events) = viewer_with_schedule(with_train(StaticEditoast::new(), 2, true)).await;
        let mut tiles = JoinSet::new();
        let mut trains = JoinSet::new();

        viewer.dispatch(&mut tiles, &mut trains);
        assert_eq!(viewer.session.train_state(TrainId(2)), Some(TrainState::PathLoading));

        // The path starts geometry and occupancy
        let path = trains.join_next().await.unwrap().unwrap();
        assert!(viewer.accept_train(path, &mut trains).await);
        assert_eq!(trains.len(), 2);
        assert_eq!(viewer.session.train_state(TrainId(2)), Some(TrainState::PathLoading));

        let first = trains.join_next().await.unwrap().unwrap();
        assert!(viewer.accept_train(first, &mut trains).await);
        let halfway = viewer.session.train_state(TrainId(2)).unwrap();
        assert!(
            matches!(halfway, TrainState::GeometryReady | TrainState::OccupancyReady),
            "unexpected state {halfway}"
        );
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

        let second = trains.join_next().await.unwrap().unwrap();
        assert!(viewer.accept_train(second, &mut trains).await);
        assert_eq!(viewer.session.train_state(TrainId(2)), Some(TrainState::Rendered));
        match events.try_recv() {
            Ok(SceneEvent::TrainReady(trajectory)) => {
                assert_eq!(trajectory.id, TrainId(2));
                assert_eq!(trajectory.blocks.len(), 1);
            }
            other => panic!("expected a ready train, got {other:?}"),
        }
        assert!(viewer.pending.is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_discards_pending_train() {
        let (mut viewer, mut events) = viewer_with_schedule(with_train(StaticEditoast::new(), 6, false)).await;
        let mut tiles = JoinSet::new();
        let mut trains = JoinSet::new();

        viewer.dispatch(&mut tiles, &mut trains);
        let path = trains.join_next().await.unwrap().unwrap();
        viewer.accept_train(path, &mut trains).await;

        while let Some(joined) = trains.join_next().await {
            viewer.accept_train(joined.unwrap(), &mut trains).await;
        }

        assert_eq!(viewer.session.train_state(TrainId(6)), Some(TrainState::Discarded));
        assert!(matches!(
            events.try_recv(),
            Ok(SceneEvent::TrainDiscarded { train: TrainId(6), .. })
        ));
        // Whichever load lands after the failure is ignored
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_results_from_previous_zoom_are_dropped() {
        let (mut viewer, mut events) = viewer_with_schedule(with_train(StaticEditoast::new(), 5, true)).await;
        let mut tiles = JoinSet::new();
        let mut trains = JoinSet::new();

        viewer.dispatch(&mut tiles, &mut trains);
        let stale_tile = tiles.join_next().await.unwrap().unwrap().request;
        let stale_train = trains.join_next().await.unwrap().unwrap();

        assert!(viewer.change_zoom(1, &mut tiles, &mut trains).await);
        assert!(matches!(events.try_recv(), Ok(SceneEvent::SessionReset { .. })));
        assert!(viewer.pending.is_empty());

        let loaded = TileOutcome {
            request: stale_tile,
            result: Ok(Vec::new()),
        };
        assert!(viewer.accept_tile(loaded).await);
        assert!(viewer.accept_train(stale_train, &mut trains).await);
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
        assert!(trains.is_empty());

        // The same result stamped with the new generation goes through
        let fresh = viewer.session.next_tile_request().unwrap();
        assert_eq!(fresh.generation, stale_tile.generation + 1);
        let loaded = TileOutcome {
            request: fresh,
            result: Ok(Vec::new()),
        };
        assert!(viewer.accept_tile(loaded).await);
        match events.try_recv() {
            Ok(SceneEvent::TileLoaded { tile, .. }) => assert_eq!(tile, fresh.tile),
            other => panic!("expected the fresh tile, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stops_when_handles_dropped() {
        let (viewer, handle, _events) = Viewer::new(Arc::new(StaticEditoast::new()), &settings());
        let running = tokio::spawn(viewer.run());

        drop(handle);
        let session = time::timeout(Duration::from_secs(5), running).await.unwrap().unwrap();
        assert_eq!(session.generation(), 0);
    }
}
