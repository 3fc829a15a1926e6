//! Invalidate and delete commands.
//!
//! Both act on the local storage directory by default. With `--remote` they
//! go through a running server instead, which also drops the server's
//! metadata cache entry on delete.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pamphlet::cache::MemoryCacheProvider;
use pamphlet::client::ApiClient;
use pamphlet::config::ConfigFile;
use pamphlet::invalidation::{DeletionReport, InvalidationCoordinator, InvalidationResult};

use super::common::{open_fs_stores, parse_id};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ManageArgs {
    /// Pamphlet id
    pub id: String,

    /// Storage directory [default: from config]
    #[arg(long, value_name = "DIR", conflicts_with = "remote")]
    pub storage: Option<PathBuf>,

    /// Send the request to a running server instead
    #[arg(long, value_name = "URL", num_args = 0..=1, default_missing_value = "")]
    pub remote: Option<String>,
}

enum Target {
    Local(InvalidationCoordinator),
    Remote(ApiClient),
}

fn target(args: &ManageArgs, config: &ConfigFile) -> Result<Target, CliError> {
    if let Some(url) = &args.remote {
        let base = if url.is_empty() {
            config.client.api_base.clone()
        } else {
            url.clone()
        };
        return Ok(Target::Remote(ApiClient::new(base)?));
    }

    let dir = args
        .storage
        .clone()
        .unwrap_or_else(|| config.storage.directory.clone());
    let stores = open_fs_stores(&dir);
    // Local runs have no edge cache of their own
    let cache = Arc::new(MemoryCacheProvider::new(config.cache.max_size_bytes, None));
    Ok(Target::Local(InvalidationCoordinator::new(
        cache,
        stores.blobs,
        stores.metadata,
    )))
}

pub async fn invalidate(args: ManageArgs, config: ConfigFile) -> Result<(), CliError> {
    let id = parse_id(&args.id)?;
    let result: InvalidationResult = match target(&args, &config)? {
        Target::Local(coordinator) => coordinator.invalidate(&id).await?,
        Target::Remote(api) => api.invalidate(&id).await?,
    };

    println!("Invalidated {}: now v{}", result.id, result.version);
    Ok(())
}

pub async fn delete(args: ManageArgs, config: ConfigFile) -> Result<(), CliError> {
    let id = parse_id(&args.id)?;
    let report: DeletionReport = match target(&args, &config)? {
        Target::Local(coordinator) => coordinator.delete_pamphlet(&id).await?,
        Target::Remote(api) => api.delete(&id).await?,
    };

    println!("Deleted {}", report.id);
    println!("  Blobs removed:  {}", report.deleted.blobs);
    println!(
        "  Metadata cache: {}",
        if report.deleted.metadata_cache {
            "removed"
        } else {
            "not present"
        }
    );
    println!("  Tile caches:    {}", report.deleted.tile_caches);
    Ok(())
}
