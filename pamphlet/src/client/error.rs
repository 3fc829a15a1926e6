//! Client-side load errors.

use thiserror::Error;

/// Errors reported to callers of the tile loader and API client.
///
/// `Clone` so a single fetch outcome can be handed to every caller waiting
/// on the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The server has no such resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Http { url: String, status: u16 },

    /// The request never produced a response.
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// The body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The viewport moved on before this queued tile was fetched.
    #[error("superseded by a newer viewport")]
    Superseded,

    /// The loader dropped the request without resolving it.
    #[error("load cancelled")]
    Cancelled,

    /// The requested page is not in the metadata.
    #[error("page {0} not found")]
    PageNotFound(u32),
}

/// Result alias for client loads.
pub type LoadResult<T> = Result<T, LoadError>;
