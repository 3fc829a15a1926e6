//! Storage error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::{ModelError, PamphletId};

/// Errors raised by the durable blob and metadata stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No metadata record exists for the pamphlet.
    #[error("pamphlet '{0}' not found")]
    NotFound(PamphletId),

    /// Key cannot be mapped onto the backing store.
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Stored metadata document is unreadable.
    #[error(transparent)]
    Document(#[from] ModelError),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
