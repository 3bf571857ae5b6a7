use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};
use glam::DVec2;
use std::path::Path;
use track_view_core::prelude::*;
use track_view_map::prelude::*;

/// Convert plane points to a GeoJSON line in lon/lat
fn plane_line_to_geojson(points: &[DVec2], plane: &TilePlane) -> Value {
    let coords: Vec<Vec<f64>> = points
        .iter()
        .map(|&p| {
            let lon_lat = plane.unproject(p);
            vec![lon_lat.x(), lon_lat.y()]
        })
        .collect();

    Value::LineString(coords)
}

fn line_feature(line: Value, properties: serde_json::Map<String, serde_json::Value>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(line)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Create a GeoJSON Feature from a decoded track section.
///
/// With a tile index the line is in lon/lat, without one it stays in tile
/// pixels.
pub fn track_to_feature(track: &TrackFeature, tile: Option<TileIndex>) -> Feature {
    let coords: Vec<Vec<f64>> = match tile {
        Some(index) => track.lon_lat(index).coords().map(|c| vec![c.x, c.y]).collect(),
        None => track
            .pixels
            .iter()
            .map(|p| vec![p.x as f64, p.y as f64])
            .collect(),
    };

    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("track"));
    properties.insert("id".to_string(), serde_json::json!(track.id.as_str()));
    properties.insert("extent".to_string(), serde_json::json!(track.extent));
    if let Some(index) = tile {
        properties.insert("tile".to_string(), serde_json::json!(index.to_string()));
    }

    line_feature(Value::LineString(coords), properties)
}

/// Create GeoJSON Features for a train: its path, then one line per
/// occupied block
pub fn train_to_features(
    trajectory: &TrainTrajectory,
    plane: &TilePlane,
    scale: &TimeScale,
) -> Result<Vec<Feature>> {
    let mut properties = serde_json::Map::new();
    properties.insert("feature_type".to_string(), serde_json::json!("train"));
    properties.insert("train".to_string(), serde_json::json!(trajectory.id.get()));
    properties.insert(
        "departure".to_string(),
        serde_json::json!(trajectory.departure.to_rfc3339()),
    );
    properties.insert("length".to_string(), serde_json::json!(trajectory.path.length));
    properties.insert("blocks".to_string(), serde_json::json!(trajectory.blocks.len()));

    let mut features = vec![line_feature(
        plane_line_to_geojson(&trajectory.geo_points, plane),
        properties,
    )];

    let views = trajectory
        .block_views(scale)
        .with_context(|| format!("Failed to lay out blocks of train {}", trajectory.id))?;

    for (block, view) in trajectory.blocks.iter().zip(views) {
        let mut properties = serde_json::Map::new();
        properties.insert("feature_type".to_string(), serde_json::json!("block"));
        properties.insert("train".to_string(), serde_json::json!(trajectory.id.get()));
        properties.insert("start_time".to_string(), serde_json::json!(block.start_time));
        properties.insert("end_time".to_string(), serde_json::json!(block.end_time));
        properties.insert("bottom".to_string(), serde_json::json!(view.bottom));
        properties.insert("top".to_string(), serde_json::json!(view.top));
        properties.insert("color".to_string(), serde_json::json!(view.color.to_hex()));

        features.push(line_feature(
            plane_line_to_geojson(&view.footprint, plane),
            properties,
        ));
    }

    Ok(features)
}

/// Write features to a GeoJSON file
pub fn write_features_geojson(features: Vec<Feature>, output_path: &Path) -> Result<()> {
    log::info!(
        "Writing {} features to {}",
        features.len(),
        output_path.display()
    );

    let feature_collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let geojson = GeoJson::from(feature_collection);
    let json_string = serde_json::to_string_pretty(&geojson)
        .context("Failed to serialize GeoJSON")?;

    std::fs::write(output_path, json_string)
        .with_context(|| format!("Failed to write GeoJSON to {}", output_path.display()))?;

    Ok(())
}
