//! Client side: tile loading for a viewer.
//!
//! - [`TileLoader`]: bounded, prioritized, deduplicating fetch scheduler
//!   with a session cache
//! - [`TileFetcher`] / [`HttpTileFetcher`]: how a single tile is fetched
//! - [`ApiClient`]: metadata and raw tile requests
//! - [`PageView`]: one page, one viewport, one loader

mod api;
mod error;
mod fetcher;
mod tile_image;
mod loader;
mod queue;
mod session;

pub use api::ApiClient;
pub use error::{LoadError, LoadResult};
pub use fetcher::{HttpTileFetcher, TileFetcher, DEFAULT_FETCH_TIMEOUT};
pub use tile_image::TileImage;
pub use loader::{
    LoaderConfig, LoaderStats, TileLoader, DEFAULT_API_BASE, DEFAULT_MAX_CONCURRENT,
    DEFAULT_SESSION_CACHE_TILES,
};
pub use session::PageView;

use crate::model::{ContentHash, PamphletId};

/// URL of a tile under an API base.
pub fn tile_url(api_base: &str, pamphlet_id: &PamphletId, hash: &ContentHash) -> String {
    format!(
        "{}/pamphlet/{}/tile/{}",
        api_base.trim_end_matches('/'),
        pamphlet_id,
        hash
    )
}
