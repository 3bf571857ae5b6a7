//! Command-line front end for the railway track viewer.
//!
//! `decode` turns a single vector tile into GeoJSON, `stream` runs the viewer
//! against editoast for a while and dumps what it loaded.

mod output;
mod scene;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use track_view_core::prelude::*;
use track_view_map::prelude::*;

use crate::output::{track_to_feature, write_features_geojson};
use crate::scene::Scene;

#[derive(Parser, Debug)]
#[command(name = "track-view")]
#[command(author, version, about = "Decode railway track tiles and stream editoast scenes to GeoJSON", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a local vector tile
    Decode {
        /// Input tile (.pbf / .mvt, optionally gzipped)
        input: PathBuf,

        /// Layer holding the track sections
        #[arg(short, long, default_value = TRACK_SECTIONS_LAYER)]
        layer: String,

        /// Zoom level of the tile; with --x and --y, output is in lon/lat
        #[arg(long, requires_all = ["x", "y"])]
        zoom: Option<u8>,

        #[arg(long, requires = "zoom")]
        x: Option<u32>,

        #[arg(long, requires = "zoom")]
        y: Option<u32>,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the viewer against editoast and record what it loads
    Stream {
        /// Settings file (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How long to stream for
        #[arg(short, long, default_value_t = 30)]
        seconds: u64,

        /// Output GeoJSON file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if args.verbose { "debug" } else { "info" }),
    )
    .format_timestamp(None)
    .init();

    match args.command {
        Command::Decode {
            input,
            layer,
            zoom,
            x,
            y,
            output,
        } => decode(&input, &layer, tile_index(zoom, x, y)?, &output),
        Command::Stream {
            config,
            seconds,
            output,
        } => stream(config.as_deref(), seconds, &output).await,
    }
}

fn tile_index(zoom: Option<u8>, x: Option<u32>, y: Option<u32>) -> Result<Option<TileIndex>> {
    match (zoom, x, y) {
        (None, None, None) => Ok(None),
        (Some(zoom), Some(x), Some(y)) => {
            if zoom > MAX_ZOOM {
                bail!("Zoom {} is above the maximum of {}", zoom, MAX_ZOOM);
            }
            let index = TileIndex::new(zoom, x, y)
                .with_context(|| format!("{}/{}/{} is outside the tile grid", zoom, x, y))?;
            Ok(Some(index))
        }
        _ => bail!("--zoom, --x and --y must be given together"),
    }
}

fn decode(input: &Path, layer: &str, tile: Option<TileIndex>, output: &Path) -> Result<()> {
    log::info!("=== Decoding {} ===", input.display());

    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to read tile {}", input.display()))?;
    let tracks = decode_track_tile(&bytes, layer)
        .with_context(|| format!("Failed to decode tile {}", input.display()))?;

    log::info!("Decoded {} track sections from layer '{}'", tracks.len(), layer);
    if tracks.is_empty() {
        log::warn!("No track sections found");
    }

    let features = tracks
        .iter()
        .map(|track| track_to_feature(track, tile))
        .collect();
    write_features_geojson(features, output)?;

    log::info!("=== Done ===");
    Ok(())
}

async fn stream(config: Option<&Path>, seconds: u64, output: &Path) -> Result<()> {
    let settings = match config {
        Some(path) => Settings::load(path)
            .await
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };

    log::info!("=== Streaming from {} for {}s ===", settings.editoast_url, seconds);

    let api = HttpEditoast::new(&settings).context("Failed to set up the editoast client")?;
    let (viewer, handle, mut events) = Viewer::new(Arc::new(api), &settings);
    let mut scene = Scene::new(viewer.session().plane());
    let running = tokio::spawn(viewer.run());

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            event = events.recv() => match event {
                Some(event) => scene.apply(event),
                None => {
                    log::warn!("Viewer stopped before the deadline");
                    break;
                }
            },
        }
    }

    // The viewer may be waiting on a full event channel
    drop(events);
    handle.shutdown().await;
    let session = running.await.context("Viewer task failed")?;

    log::info!(
        "Loaded {} tiles, {} track sections, {} trains ({} discarded)",
        session.tiles().len(),
        scene.track_count(),
        scene.train_count(),
        scene.discarded_count()
    );

    let features = scene.to_features(&TimeScale::new(settings.seconds_per_unit))?;
    write_features_geojson(features, output)?;

    log::info!("=== Done ===");
    Ok(())
}
