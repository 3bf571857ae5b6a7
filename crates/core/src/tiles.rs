//! Fetching and decoding of track tiles.

use tracing::debug;
use track_view_map::prelude::*;

use crate::editoast::{ApiError, EditoastApi};

#[derive(Debug, thiserror::Error)]
pub enum TileLoadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Decode(#[from] TileDecodeError),
}

/// Track features of `tile`, empty when editoast has nothing there.
pub async fn load_track_tile(
    api: &dyn EditoastApi,
    layer: &str,
    tile: TileIndex,
) -> Result<Vec<TrackFeature>, TileLoadError> {
    let bytes = api.track_tile(layer, tile).await?;
    let features = decode_track_tile(&bytes, layer)?;

    debug!(%tile, bytes = bytes.len(), features = features.len(), "loaded track tile");
    Ok(features)
}
