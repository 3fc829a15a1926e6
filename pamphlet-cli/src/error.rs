//! CLI error type.

use std::path::PathBuf;

use pamphlet::client::LoadError;
use pamphlet::config::ConfigError;
use pamphlet::logging::LoggingError;
use pamphlet::model::ModelError;
use pamphlet::store::StoreError;
use pamphlet::tiling::TilingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tiling(#[from] TilingError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{failed} of {total} tiles failed to load")]
    IncompleteLoad { failed: usize, total: usize },

    #[error("background task failed: {0}")]
    Task(String),

    #[error("server error: {0}")]
    Serve(String),
}
