//! Serve command - run the HTTP tile service until Ctrl-C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use pamphlet::cache::{Cache, CacheWriter, MemoryCacheProvider, DEFAULT_WRITE_QUEUE_CAPACITY};
use pamphlet::config::ConfigFile;
use pamphlet::gateway::TileGateway;
use pamphlet::invalidation::InvalidationCoordinator;
use pamphlet::server::{self, AppState};
use pamphlet::store::{MemoryBlobStore, MemoryMetadataStore};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::common::{format_size, open_fs_stores, Stores};
use crate::error::CliError;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on [default: from config, 127.0.0.1:8787]
    #[arg(long)]
    pub bind: Option<SocketAddr>,

    /// Storage directory [default: from config]
    #[arg(long, value_name = "DIR", conflicts_with = "ephemeral")]
    pub storage: Option<PathBuf>,

    /// Keep everything in memory; nothing survives a restart
    #[arg(long)]
    pub ephemeral: bool,
}

pub async fn run(args: ServeArgs, mut config: ConfigFile) -> Result<(), CliError> {
    if let Some(bind) = args.bind {
        config = config.with_bind(bind);
    }
    if let Some(dir) = args.storage {
        config = config.with_storage_directory(dir);
    }

    let stores = if args.ephemeral {
        Stores {
            blobs: Arc::new(MemoryBlobStore::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
        }
    } else {
        open_fs_stores(&config.storage.directory)
    };

    let shutdown = CancellationToken::new();
    let provider = Arc::new(MemoryCacheProvider::new(
        config.cache.max_size_bytes,
        Some(config.cache.tile_ttl),
    ));
    let cache: Arc<dyn Cache> = provider.clone();
    let (writer, writer_handle) =
        CacheWriter::spawn(Arc::clone(&cache), DEFAULT_WRITE_QUEUE_CAPACITY, shutdown.clone());

    let gateway = TileGateway::new(
        Arc::clone(&cache),
        Arc::clone(&stores.blobs),
        Arc::clone(&stores.metadata),
        writer,
    );
    let coordinator = InvalidationCoordinator::new(cache, stores.blobs, stores.metadata);
    let state = AppState::new(gateway, coordinator)
        .with_metadata_max_age(config.cache.metadata_max_age);

    let listener = TcpListener::bind(config.server.bind)
        .await
        .map_err(|e| CliError::Serve(format!("failed to bind {}: {}", config.server.bind, e)))?;

    println!("Pamphlet tile service v{}", pamphlet::VERSION);
    println!("================================");
    println!();
    println!("Listening:  http://{}", config.server.bind);
    if args.ephemeral {
        println!("Storage:    in-memory (ephemeral)");
    } else {
        println!("Storage:    {}", config.storage.directory.display());
    }
    println!(
        "Edge cache: {} (tile TTL {}s)",
        format_size(config.cache.max_size_bytes),
        config.cache.tile_ttl.as_secs()
    );
    println!();
    println!("Press Ctrl-C to stop.");

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
        signal_token.cancel();
    });

    let result = server::serve(listener, state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(e) = writer_handle.await {
        warn!(error = %e, "Cache writer task failed");
    }

    provider.run_pending_tasks().await;
    info!(
        entries = provider.entry_count(),
        bytes = provider.size_bytes(),
        "Edge cache at shutdown"
    );

    result.map_err(|e| CliError::Serve(e.to_string()))
}
