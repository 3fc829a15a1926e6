//! Fetch command - load one page through the client tile loader.
//!
//! Exercises the same path a viewer takes: paged metadata, viewport culling,
//! prioritized loading with bounded concurrency, then prints loader stats.

use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use pamphlet::client::{ApiClient, HttpTileFetcher, LoaderConfig, PageView, TileLoader};
use pamphlet::config::ConfigFile;
use pamphlet::model::{Metadata, PageRange};
use pamphlet::viewport::PixelRect;

use super::common::{parse_id, parse_size};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Pamphlet id
    pub id: String,

    /// Zero-based page number
    #[arg(long, default_value_t = 0)]
    pub page: u32,

    /// Server base URL [default: from config]
    #[arg(long, value_name = "URL")]
    pub api: Option<String>,

    /// Viewport size in screen pixels, e.g. 1920x1080. Without it every
    /// tile is treated as visible.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub viewport: Option<(f64, f64)>,

    /// Screen pixels per page pixel
    #[arg(long, default_value_t = 1.0)]
    pub scale: f64,

    /// Maximum concurrent tile fetches [default: from config]
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub async fn run(args: FetchArgs, mut config: ConfigFile) -> Result<(), CliError> {
    let id = parse_id(&args.id)?;
    if let Some(api) = &args.api {
        config = config.with_api_base(api.clone());
    }
    if let Some(n) = args.concurrency {
        config = config.with_max_concurrent(n);
    }

    let api = ApiClient::new(config.client.api_base.clone())?;
    let slice = api
        .fetch_metadata_pages(&id, PageRange::single(args.page as usize))
        .await?;
    let metadata = Arc::new(Metadata::new(slice.version, slice.tile_size, slice.pages));

    let loader = TileLoader::new(
        HttpTileFetcher::with_client(api.http().clone()),
        LoaderConfig::default()
            .with_api_base(config.client.api_base.clone())
            .with_max_concurrent(config.client.max_concurrent)
            .with_cache_capacity(config.client.session_cache_tiles),
    );
    let mut view = PageView::new(loader.clone(), id.clone(), Arc::clone(&metadata), args.page)?;

    if let Some((width, height)) = args.viewport {
        view.set_viewport(PixelRect::from_size(width, height), args.scale)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    }

    let visible = view.visible_tiles().len();
    let prefetch = view.prefetch_tiles().len();
    let total = visible + prefetch;

    println!(
        "{} v{} page {} of {} ({}px tiles)",
        id, metadata.version, args.page, slice.total_pages, metadata.tile_size
    );
    println!("  Visible tiles:  {}", visible);
    println!("  Prefetch tiles: {}", prefetch);

    let started = Instant::now();
    let loaded = view.load().await;
    let elapsed = started.elapsed();

    let stats = loader.stats();
    println!();
    println!("Loaded {}/{} tiles in {:.2?}", loaded.len(), total, elapsed);
    println!("  Failed:  {}", total.saturating_sub(loaded.len()));
    println!("  Cached:  {}", stats.cached);
    println!("  Pending: {}", stats.pending);
    println!("  Epoch:   {}", stats.epoch);

    if loaded.len() < total {
        return Err(CliError::IncompleteLoad {
            failed: total - loaded.len(),
            total,
        });
    }
    Ok(())
}
