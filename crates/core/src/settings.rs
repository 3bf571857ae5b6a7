//! Runtime settings of a viewer session.

use std::path::Path;
use std::time::Duration;

use geo::Point;
use serde::{Deserialize, Serialize};
use track_view_map::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid setting `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Every field falls back to its default when missing from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the editoast service, with a trailing slash.
    pub editoast_url: String,
    pub infra_id: InfraId,
    pub timetable_id: TimetableId,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub start_zoom_level: u8,
    /// Edge length of one tile in scene units.
    pub tile_size: f64,
    /// Ring search radius, in tiles.
    pub tile_sight_distance: u32,
    pub track_layer: String,
    /// Seconds of schedule per scene unit of height.
    pub seconds_per_unit: f64,
    pub tick_interval_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            editoast_url: "http://localhost:4000/".to_string(),
            infra_id: InfraId(2),
            timetable_id: TimetableId(2),
            start_latitude: 49.5327827,
            start_longitude: -0.4015937,
            start_zoom_level: 11,
            tile_size: 15.0,
            tile_sight_distance: 2,
            track_layer: TRACK_SECTIONS_LAYER.to_string(),
            seconds_per_unit: 200.0,
            tick_interval_ms: 100,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
            SettingsError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if !(self.tile_size.is_finite() && self.tile_size > 0.0) {
            return Err(invalid("tile_size", format!("{} is not a positive size", self.tile_size)));
        }
        if !(self.seconds_per_unit.is_finite() && self.seconds_per_unit > 0.0) {
            return Err(invalid(
                "seconds_per_unit",
                format!("{} is not a positive scale", self.seconds_per_unit),
            ));
        }
        if self.start_zoom_level > MAX_ZOOM {
            return Err(invalid(
                "start_zoom_level",
                format!("{} is above {MAX_ZOOM}", self.start_zoom_level),
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be at least 1"));
        }
        if !(-85.0..=85.0).contains(&self.start_latitude) {
            return Err(invalid(
                "start_latitude",
                format!("{} is outside the projected range", self.start_latitude),
            ));
        }

        Ok(())
    }

    /// Starting viewer position as lon/lat.
    pub fn start_position(&self) -> Point {
        Point::new(self.start_longitude, self.start_latitude)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
