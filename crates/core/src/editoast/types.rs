//! Typed editoast payloads.
//!
//! Each response type knows how to [`validate`](Validate::validate) itself so
//! that missing or nonsensical fields are reported as a malformed payload at
//! the API boundary instead of surfacing deep inside the pipeline.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use track_view_map::prelude::*;

use super::{ApiError, Result};

pub trait Validate: Sized {
    fn validate(self) -> Result<Self>;
}

/// One page of `api/timetable/{id}/train_schedules/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSchedulePage {
    pub results: Vec<TrainScheduleSummary>,
    /// Page to request next, absent on the last page.
    #[serde(default)]
    pub next: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainScheduleSummary {
    pub id: TrainId,
    pub start_time: DateTime<Utc>,
}

impl Validate for TrainSchedulePage {
    fn validate(self) -> Result<Self> {
        if self.next == Some(0) {
            return Err(ApiError::Malformed("schedule pages start at 1, got next page 0".to_string()));
        }
        Ok(self)
    }
}

/// A train's path through the infrastructure.
///
/// Ranges, blocks and routes are opaque here and only ever sent back to
/// editoast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainPath {
    pub track_section_ranges: Vec<Value>,
    #[serde(default)]
    pub blocks: Vec<Value>,
    #[serde(default)]
    pub routes: Vec<Value>,
    /// Same unit as the positions of signal updates.
    pub length: u64,
}

impl Validate for TrainPath {
    fn validate(self) -> Result<Self> {
        if self.length == 0 {
            return Err(ApiError::Malformed("path has zero length".to_string()));
        }
        if self.track_section_ranges.is_empty() {
            return Err(ApiError::Malformed("path has no track section ranges".to_string()));
        }
        Ok(self)
    }
}

/// `geometry` property of `api/infra/{infra}/path_properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathProperties {
    pub geometry: LineGeometry,
}

/// GeoJSON `LineString` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGeometry {
    pub coordinates: Vec<Vec<f64>>,
}

impl PathProperties {
    pub fn from_points(points: &[Point]) -> Self {
        Self {
            geometry: LineGeometry {
                coordinates: points.iter().map(|p| vec![p.x(), p.y()]).collect(),
            },
        }
    }

    /// Lon/lat points, extra dimensions dropped.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.geometry
            .coordinates
            .iter()
            .map(|position| Point::new(position[0], position[1]))
    }
}

impl Validate for PathProperties {
    fn validate(self) -> Result<Self> {
        let coordinates = &self.geometry.coordinates;
        if coordinates.len() < 2 {
            return Err(ApiError::Malformed(format!(
                "path geometry has {} coordinate(s)",
                coordinates.len()
            )));
        }

        let bad = coordinates
            .iter()
            .position(|c| c.len() < 2 || !c[0].is_finite() || !c[1].is_finite());
        if let Some(index) = bad {
            return Err(ApiError::Malformed(format!(
                "path geometry coordinate {index} is not a lon/lat pair"
            )));
        }

        Ok(self)
    }
}

/// Space-time projection of one train, as found under its id in the
/// `api/train_schedule/project_path` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainProjection {
    pub departure_time: DateTime<Utc>,
    pub signal_updates: Vec<SignalUpdate>,
}

/// A signal block the train occupies. Times are milliseconds from the train's
/// departure, positions are along the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalUpdate {
    pub time_start: i64,
    pub time_end: i64,
    pub position_start: u64,
    pub position_end: u64,
    /// Packed `0xRRGGBB`.
    pub color: u32,
}

impl SignalUpdate {
    /// Checks that the update ends no earlier than it starts, in time and
    /// along the path.
    pub fn check(&self) -> std::result::Result<(), String> {
        if self.time_end < self.time_start {
            return Err(format!(
                "ends at {} ms before starting at {} ms",
                self.time_end, self.time_start
            ));
        }
        if self.position_end < self.position_start {
            return Err(format!(
                "ends at position {} before starting at {}",
                self.position_end, self.position_start
            ));
        }
        Ok(())
    }
}

impl Validate for TrainProjection {
    fn validate(self) -> Result<Self> {
        for (index, update) in self.signal_updates.iter().enumerate() {
            update
                .check()
                .map_err(|reason| ApiError::Malformed(format!("signal update {index}: {reason}")))?;
        }
        Ok(self)
    }
}

/// Body of `api/infra/{infra}/path_properties`.
#[derive(Debug, Clone, Serialize)]
pub struct PathPropertiesRequest<'a> {
    pub track_section_ranges: &'a [Value],
}

/// Body of `api/train_schedule/project_path`.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectPathRequest<'a> {
    pub infra_id: InfraId,
    pub ids: Vec<TrainId>,
    pub path: ProjectedPath<'a>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectedPath<'a> {
    pub track_section_ranges: &'a [Value],
    pub routes: &'a [Value],
    pub blocks: &'a [Value],
}

impl<'a> ProjectPathRequest<'a> {
    pub fn new(infra_id: InfraId, train: TrainId, path: &'a TrainPath) -> Self {
        Self {
            infra_id,
            ids: vec![train],
            path: ProjectedPath {
                track_section_ranges: &path.track_section_ranges,
                routes: &path.routes,
                blocks: &path.blocks,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_schedule_page() {
        let page: TrainSchedulePage = serde_json::from_value(json!({
            "count": 2,
            "next": 2,
            "results": [
                { "id": 11, "start_time": "2024-05-02T08:00:00Z", "train_name": "a" },
                { "id": 12, "start_time": "2024-05-02T07:30:00Z" }
            ]
        }))
        .unwrap();

        assert_eq!(page.next, Some(2));
        assert_eq!(page.results[1].id, TrainId(12));

        let last: TrainSchedulePage =
            serde_json::from_value(json!({ "results": [], "next": null })).unwrap();
        assert_eq!(last.next, None);
    }

    #[test]
    fn test_path_validation() {
        let path: TrainPath = serde_json::from_value(json!({
            "track_section_ranges": [{ "track_section": "TA0", "begin": 0, "end": 1000 }],
            "blocks": ["b1"],
            "routes": ["r1"],
            "length": 1000
        }))
        .unwrap();
        assert!(path.clone().validate().is_ok());

        let empty = TrainPath { length: 0, ..path.clone() };
        assert!(matches!(empty.validate(), Err(ApiError::Malformed(_))));

        let no_ranges = TrainPath {
            track_section_ranges: Vec::new(),
            ..path
        };
        assert!(no_ranges.validate().is_err());
    }

    #[test]
    fn test_missing_length_is_rejected() {
        let result = serde_json::from_value::<TrainPath>(json!({ "track_section_ranges": [] }));
        assert!(result.is_err());
    }

    #[test]
    fn test_geometry_validation() {
        let ok = PathProperties::from_points(&[Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        assert_eq!(ok.clone().validate().unwrap().points().count(), 2);

        let single = PathProperties::from_points(&[Point::new(0.0, 0.0)]);
        assert!(single.validate().is_err());

        let ragged: PathProperties = serde_json::from_value(json!({
            "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0]] }
        }))
        .unwrap();
        assert!(ragged.validate().is_err());

        let with_altitude: PathProperties = serde_json::from_value(json!({
            "geometry": { "coordinates": [[0.0, 0.0, 12.0], [1.0, 2.0, 13.0]] }
        }))
        .unwrap();
        let points: Vec<_> = with_altitude.validate().unwrap().points().collect();
        assert_eq!(points[1], Point::new(1.0, 2.0));
    }

    #[test]
    fn test_projection_keyed_by_train() {
        let response: HashMap<TrainId, TrainProjection> = serde_json::from_value(json!({
            "42": {
                "departure_time": "2024-05-02T08:00:00Z",
                "signal_updates": [{
                    "signal_id": "S1",
                    "time_start": 0,
                    "time_end": 5000,
                    "position_start": 0,
                    "position_end": 500,
                    "color": 65280,
                    "blinking": false
                }]
            }
        }))
        .unwrap();

        let projection = &response[&TrainId(42)];
        assert_eq!(projection.signal_updates[0].color, 0x00FF00);
    }

    #[test]
    fn test_schedule_page_validation() {
        let page = TrainSchedulePage {
            results: Vec::new(),
            next: Some(0),
        };
        assert!(matches!(page.validate(), Err(ApiError::Malformed(_))));

        let page = TrainSchedulePage {
            results: Vec::new(),
            next: Some(2),
        };
        assert!(page.validate().is_ok());
    }

    #[test]
    fn test_projection_validation() {
        let update = SignalUpdate {
            time_start: 0,
            time_end: 5000,
            position_start: 0,
            position_end: 500,
            color: 0,
        };
        let projection = TrainProjection {
            departure_time: "2024-05-02T08:00:00Z".parse().unwrap(),
            signal_updates: vec![update.clone()],
        };
        assert!(projection.clone().validate().is_ok());

        let backwards_in_time = TrainProjection {
            signal_updates: vec![update.clone(), SignalUpdate { time_end: -1, ..update.clone() }],
            ..projection.clone()
        };
        let err = backwards_in_time.validate().unwrap_err();
        assert!(matches!(&err, ApiError::Malformed(reason) if reason.starts_with("signal update 1")));

        let backwards_in_space = TrainProjection {
            signal_updates: vec![SignalUpdate { position_start: 600, ..update }],
            ..projection
        };
        assert!(matches!(backwards_in_space.validate(), Err(ApiError::Malformed(_))));
    }

    #[test]
    fn test_project_path_request_body() {
        let path = TrainPath {
            track_section_ranges: vec![json!({ "track_section": "TA0" })],
            blocks: vec![json!("b")],
            routes: vec![json!("r")],
            length: 10,
        };
        let body = serde_json::to_value(ProjectPathRequest::new(InfraId(2), TrainId(9), &path)).unwrap();

        assert_eq!(
            body,
            json!({
                "infra_id": 2,
                "ids": [9],
                "path": {
                    "track_section_ranges": [{ "track_section": "TA0" }],
                    "routes": ["r"],
                    "blocks": ["b"]
                }
            })
        );
    }
}
