use anyhow::Result;
use geojson::Feature;
use track_view_core::prelude::*;
use track_view_map::prelude::*;

use crate::output::{track_to_feature, train_to_features};

/// What a streamed viewer has shown so far
pub struct Scene {
    plane: TilePlane,
    tracks: Vec<(TileIndex, TrackFeature)>,
    trains: Vec<TrainTrajectory>,
    discarded: usize,
}

impl Scene {
    pub fn new(plane: TilePlane) -> Self {
        Self {
            plane,
            tracks: Vec::new(),
            trains: Vec::new(),
            discarded: 0,
        }
    }

    pub fn apply(&mut self, event: SceneEvent) {
        match event {
            SceneEvent::TileLoaded { tile, features, .. } => {
                log::debug!("Tile {} brought {} track sections", tile, features.len());
                self.tracks.extend(features.into_iter().map(|f| (tile, f)));
            }
            SceneEvent::TrainReady(trajectory) => {
                log::info!(
                    "Train {} ready with {} blocks",
                    trajectory.id,
                    trajectory.blocks.len()
                );
                self.trains.push(*trajectory);
            }
            SceneEvent::TrainDiscarded { train, reason } => {
                log::warn!("Train {} discarded: {}", train, reason);
                self.discarded += 1;
            }
            SceneEvent::SessionReset { plane, .. } => {
                log::info!("Session reset at zoom {}", plane.zoom());
                self.plane = plane;
                self.tracks.clear();
                self.trains.clear();
                self.discarded = 0;
            }
        }
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn train_count(&self) -> usize {
        self.trains.len()
    }

    pub fn discarded_count(&self) -> usize {
        self.discarded
    }

    /// Tracks first, then every train with its blocks
    pub fn to_features(&self, scale: &TimeScale) -> Result<Vec<Feature>> {
        let mut features: Vec<Feature> = self
            .tracks
            .iter()
            .map(|(tile, track)| track_to_feature(track, Some(*tile)))
            .collect();

        for trajectory in &self.trains {
            features.extend(train_to_features(trajectory, &self.plane, scale)?);
        }

        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use geo::Point;
    use glam::{DVec2, IVec2};
    use std::sync::Arc;
    use track_view_core::editoast::TrainPath;

    fn plane() -> TilePlane {
        TilePlane::centered_on(Point::new(-0.4015937, 49.5327827), 11, 15.0)
    }

    fn tile_loaded() -> SceneEvent {
        let tile = plane().origin();
        SceneEvent::TileLoaded {
            tile,
            tile_origin: plane().tile_origin(tile),
            features: vec![TrackFeature {
                id: TrackSectionId::from("TA0"),
                pixels: vec![IVec2::new(0, 0), IVec2::new(100, 0)],
                extent: 4096,
            }],
        }
    }

    fn train_ready() -> SceneEvent {
        SceneEvent::TrainReady(Box::new(TrainTrajectory {
            id: TrainId(3),
            departure: Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
            path: Arc::new(TrainPath {
                track_section_ranges: vec![serde_json::json!({ "track_section": "TA0" })],
                blocks: Vec::new(),
                routes: Vec::new(),
                length: 100,
            }),
            geo_points: vec![DVec2::new(0.0, 0.0), DVec2::new(0.0, 8.0)],
            blocks: Vec::new(),
        }))
    }

    #[test]
    fn test_collects_events() {
        let mut scene = Scene::new(plane());
        scene.apply(tile_loaded());
        scene.apply(train_ready());
        scene.apply(SceneEvent::TrainDiscarded {
            train: TrainId(4),
            reason: "no path".to_string(),
        });

        assert_eq!(scene.track_count(), 1);
        assert_eq!(scene.train_count(), 1);
        assert_eq!(scene.discarded_count(), 1);

        let features = scene.to_features(&TimeScale::new(200.0)).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].properties.as_ref().unwrap()["feature_type"], "track");
        assert_eq!(features[1].properties.as_ref().unwrap()["feature_type"], "train");
    }

    #[test]
    fn test_reset_forgets_previous_zoom() {
        let mut scene = Scene::new(plane());
        scene.apply(tile_loaded());
        scene.apply(train_ready());

        let zoomed = TilePlane::centered_on(Point::new(-0.4015937, 49.5327827), 12, 15.0);
        scene.apply(SceneEvent::SessionReset {
            plane: zoomed,
            viewer: DVec2::ZERO,
        });

        assert_eq!(scene.track_count(), 0);
        assert_eq!(scene.train_count(), 0);
        assert!(scene.to_features(&TimeScale::new(200.0)).unwrap().is_empty());
    }
}
