//! Track geometry out of Mapbox Vector Tiles.

pub mod geometry;

use std::io::Read;

use flate2::read::GzDecoder;
use geo::{Coord, LineString};
use geozero::mvt::tile::{Feature, Layer, Value};
use geozero::mvt::{Message, Tile};
use glam::{DVec2, DVec3, IVec2};
use tracing::{debug, warn};

use crate::identifiers::TrackSectionId;
use crate::plane::{pixel_to_plane, to_world};
use crate::projection::tile_to_lon_lat;
use crate::tile::TileIndex;

pub use geometry::GeometryError;

/// Vector tile protobuf messages.
pub use geozero::mvt as proto;

/// Layer editoast serves track sections under.
pub const TRACK_SECTIONS_LAYER: &str = "track_sections";

/// Pixels per tile edge when a layer does not say otherwise.
pub const DEFAULT_EXTENT: u32 = 4096;

const ID_ATTRIBUTE: &str = "id";
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, thiserror::Error)]
pub enum TileDecodeError {
    #[error("invalid vector tile: {0}")]
    Protobuf(String),

    #[error("failed to inflate gzipped tile: {0}")]
    Gzip(#[from] std::io::Error),
}

/// One track section line, in tile-local pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeature {
    pub id: TrackSectionId,
    /// `0..extent` on both axes, `y` pointing down.
    pub pixels: Vec<IVec2>,
    pub extent: u32,
}

impl TrackFeature {
    /// Pixels placed on the plane, `tile_origin` being the tile's south-west
    /// corner as given by [`TilePlane::tile_origin`](crate::plane::TilePlane::tile_origin).
    pub fn plane_points(&self, tile_origin: DVec2, tile_size: f64) -> Vec<DVec2> {
        let extent = self.extent as f64;
        self.pixels
            .iter()
            .map(|pixel| pixel_to_plane(tile_origin, pixel.as_dvec2(), extent, tile_size))
            .collect()
    }

    /// Scene points lying on the ground.
    pub fn world_points(&self, tile_origin: DVec2, tile_size: f64) -> Vec<DVec3> {
        self.plane_points(tile_origin, tile_size)
            .into_iter()
            .map(|point| to_world(point, 0.0))
            .collect()
    }

    /// Geographic line for a feature decoded from tile `index`.
    pub fn lon_lat(&self, index: TileIndex) -> LineString {
        let extent = self.extent as f64;
        self.pixels
            .iter()
            .map(|pixel| {
                let tile = Coord {
                    x: index.x as f64 + pixel.x as f64 / extent,
                    y: index.y as f64 + pixel.y as f64 / extent,
                };
                tile_to_lon_lat(index.zoom, tile).0
            })
            .collect()
    }
}

/// Decodes the features of `layer_name` out of a raw tile.
///
/// Empty input and a tile without the layer both mean "no tracks here" and
/// yield an empty list. Gzipped payloads are inflated first. Features without
/// an id or with a broken command stream are skipped.
pub fn decode_track_tile(
    bytes: &[u8],
    layer_name: &str,
) -> Result<Vec<TrackFeature>, TileDecodeError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }

    let tile = if bytes.starts_with(&GZIP_MAGIC) {
        let mut inflated = Vec::new();
        GzDecoder::new(bytes).read_to_end(&mut inflated)?;
        decode_tile(&inflated)?
    } else {
        decode_tile(bytes)?
    };

    let Some(layer) = tile.layers.iter().find(|layer| layer.name == layer_name) else {
        debug!(layer = layer_name, "layer absent from tile");
        return Ok(Vec::new());
    };

    let extent = layer.extent.unwrap_or(DEFAULT_EXTENT);
    let mut features = Vec::with_capacity(layer.features.len());

    for (position, feature) in layer.features.iter().enumerate() {
        let Some(id) = feature_id(layer, feature) else {
            warn!(layer = layer_name, position, "skipping feature without id");
            continue;
        };

        let rings = match geometry::decode_rings(&feature.geometry) {
            Ok(rings) => rings,
            Err(error) => {
                warn!(%id, %error, "skipping feature with malformed geometry");
                continue;
            }
        };

        // Track sections are single lines; later rings are ignored
        match rings.into_iter().next() {
            Some(pixels) if !pixels.is_empty() => features.push(TrackFeature { id, pixels, extent }),
            _ => warn!(%id, "skipping feature with empty geometry"),
        }
    }

    debug!(layer = layer_name, count = features.len(), "decoded track features");
    Ok(features)
}

fn decode_tile(bytes: &[u8]) -> Result<Tile, TileDecodeError> {
    Tile::decode(bytes).map_err(|e| TileDecodeError::Protobuf(e.to_string()))
}

/// Attribute rendered as text, whatever its wire type.
fn value_text(value: &Value) -> Option<String> {
    if let Some(s) = &value.string_value {
        return Some(s.clone());
    }

    value
        .int_value
        .or(value.sint_value)
        .map(|v| v.to_string())
        .or_else(|| value.uint_value.map(|v| v.to_string()))
        .or_else(|| value.double_value.map(|v| v.to_string()))
        .or_else(|| value.float_value.map(|v| v.to_string()))
        .or_else(|| value.bool_value.map(|v| v.to_string()))
}

/// The `id` attribute, falling back to the feature's own numeric id.
fn feature_id(layer: &Layer, feature: &Feature) -> Option<TrackSectionId> {
    let attribute = feature.tags.chunks_exact(2).find_map(|pair| {
        let key = layer.keys.get(pair[0] as usize)?;
        if key != ID_ATTRIBUTE {
            return None;
        }
        value_text(layer.values.get(pair[1] as usize)?)
    });

    attribute
        .or_else(|| feature.id.map(|id| id.to_string()))
        .map(TrackSectionId::from)
}
