//! Publish command - tile page images and store them as a pamphlet.

use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use pamphlet::config::ConfigFile;
use pamphlet::invalidation::Publisher;
use pamphlet::tiling::{ImageTiler, TilingEngine, DEFAULT_QUALITY, DEFAULT_TILE_SIZE};
use tracing::info;

use super::common::{open_fs_stores, parse_id};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct PublishArgs {
    /// Pamphlet id
    pub id: String,

    /// Page images, in page order
    #[arg(required = true)]
    pub images: Vec<PathBuf>,

    /// Tile edge length in pixels
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE)]
    pub tile_size: u32,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = DEFAULT_QUALITY, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: u8,

    /// Storage directory [default: from config]
    #[arg(long, value_name = "DIR")]
    pub storage: Option<PathBuf>,
}

pub async fn run(args: PublishArgs, mut config: ConfigFile) -> Result<(), CliError> {
    let id = parse_id(&args.id)?;
    if let Some(dir) = args.storage {
        config = config.with_storage_directory(dir);
    }
    if args.tile_size == 0 {
        return Err(CliError::InvalidArgument("tile size must be greater than zero".into()));
    }

    let started = Instant::now();
    let mut pages = Vec::with_capacity(args.images.len());

    for (n, path) in args.images.iter().enumerate() {
        let bytes = tokio::fs::read(path).await.map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;

        let (tile_size, quality) = (args.tile_size, args.quality);
        let tiled = tokio::task::spawn_blocking(move || {
            ImageTiler::new().tile(&bytes, tile_size, quality)
        })
        .await
        .map_err(|e| CliError::Task(e.to_string()))??;

        println!(
            "Page {:>3}: {} ({}x{}, {} tiles)",
            n,
            path.display(),
            tiled.width,
            tiled.height,
            tiled.tiles.len()
        );
        pages.push(tiled);
    }

    let stores = open_fs_stores(&config.storage.directory);
    let report = Publisher::new(stores.blobs, stores.metadata)
        .publish(&id, args.tile_size, &pages)
        .await?;

    info!(
        id = %report.id,
        version = report.version,
        uploaded = report.tiles_uploaded,
        "Pamphlet published"
    );

    println!();
    println!("Published {} v{}", report.id, report.version);
    println!("  Pages:          {}", report.pages);
    println!("  Tiles:          {}", report.tiles_total);
    println!("  Blobs uploaded: {}", report.tiles_uploaded);
    println!("  Blobs reused:   {}", report.tiles_skipped);
    println!("  Storage:        {}", config.storage.directory.display());
    println!("  Elapsed:        {:.2?}", started.elapsed());

    Ok(())
}
