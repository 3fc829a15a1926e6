//! Tiered cache gateway.
//!
//! Resolves tile and metadata reads through two tiers:
//!
//! ```text
//! request ──► edge cache (versioned key) ──hit──► HIT
//!                    │ miss
//!                    ▼
//!             durable store ──miss──► NotFound (cache untouched)
//!                    │ hit
//!                    ├──► MISS response, returned immediately
//!                    └──► CacheWriter ──► edge cache (background)
//! ```
//!
//! Tiles are located in the durable store by content hash alone; the
//! metadata version only selects the edge cache key. Edge cache read errors
//! degrade to a miss and background write errors are logged by the writer,
//! so the edge tier can never fail a request.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cache::{Cache, CacheKey, CacheWriter};
use crate::model::{ContentHash, Metadata, ModelError, PamphletId};
use crate::store::{keys, BlobStore, MetadataStore, StoreError};

/// Errors returned by gateway reads.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The pamphlet has no metadata record.
    #[error("pamphlet '{0}' not found")]
    PamphletNotFound(PamphletId),

    /// No blob exists for the hash.
    #[error("tile {hash} not found in pamphlet '{pamphlet_id}'")]
    TileNotFound {
        pamphlet_id: PamphletId,
        hash: ContentHash,
    },

    /// The durable tier failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Metadata could not be serialized.
    #[error(transparent)]
    Document(#[from] ModelError),
}

impl GatewayError {
    /// Whether this is a not-found outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::PamphletNotFound(_)
                | GatewayError::TileNotFound { .. }
                | GatewayError::Store(StoreError::NotFound(_))
        )
    }
}

/// Result alias for gateway reads.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Which tier answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tile body and the tier that produced it.
#[derive(Debug, Clone)]
pub struct TileResponse {
    pub body: Bytes,
    pub version: u64,
    pub status: CacheStatus,
}

/// A metadata document, its serialized body, and the tier that produced
/// the body.
#[derive(Debug, Clone)]
pub struct MetadataResponse {
    pub metadata: Metadata,
    pub body: Bytes,
    pub status: CacheStatus,
}

/// Read path shared by every HTTP handler.
#[derive(Clone)]
pub struct TileGateway {
    cache: Arc<dyn Cache>,
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    writer: CacheWriter,
}

impl TileGateway {
    pub fn new(
        cache: Arc<dyn Cache>,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        writer: CacheWriter,
    ) -> Self {
        Self {
            cache,
            blobs,
            metadata,
            writer,
        }
    }

    /// Fetch a tile as referenced by a specific metadata version.
    #[instrument(skip(self, hash), fields(hash = %hash.short()))]
    pub async fn get_tile(
        &self,
        pamphlet_id: &PamphletId,
        hash: &ContentHash,
        version: u64,
    ) -> GatewayResult<TileResponse> {
        let key = CacheKey::tile(pamphlet_id, hash, version);

        if let Some(body) = self.cache_lookup(&key).await {
            debug!(key = %key, "Cache HIT");
            return Ok(TileResponse {
                body,
                version,
                status: CacheStatus::Hit,
            });
        }
        debug!(key = %key, "Cache MISS");

        let body = self
            .blobs
            .get(&keys::tile_blob_key(pamphlet_id, hash))
            .await?
            .ok_or_else(|| GatewayError::TileNotFound {
                pamphlet_id: pamphlet_id.clone(),
                hash: hash.clone(),
            })?;

        self.writer.schedule(key, body.clone());

        Ok(TileResponse {
            body,
            version,
            status: CacheStatus::Miss,
        })
    }

    /// Fetch a tile under the pamphlet's current metadata version.
    pub async fn get_current_tile(
        &self,
        pamphlet_id: &PamphletId,
        hash: &ContentHash,
    ) -> GatewayResult<TileResponse> {
        let version = self
            .metadata
            .current_version(pamphlet_id)
            .await?
            .ok_or_else(|| GatewayError::PamphletNotFound(pamphlet_id.clone()))?;
        self.get_tile(pamphlet_id, hash, version).await
    }

    /// Load the current metadata document.
    ///
    /// The serialized body is cached under the metadata key for the loaded
    /// version, so repeat reads skip re-serialization.
    #[instrument(skip(self))]
    pub async fn get_metadata(&self, pamphlet_id: &PamphletId) -> GatewayResult<MetadataResponse> {
        let metadata = self
            .metadata
            .get(pamphlet_id)
            .await?
            .ok_or_else(|| GatewayError::PamphletNotFound(pamphlet_id.clone()))?;

        let key = CacheKey::metadata(pamphlet_id, metadata.version);
        if let Some(body) = self.cache_lookup(&key).await {
            return Ok(MetadataResponse {
                metadata,
                body,
                status: CacheStatus::Hit,
            });
        }

        let body = Bytes::from(metadata.to_json()?);
        self.writer.schedule(key, body.clone());

        Ok(MetadataResponse {
            metadata,
            body,
            status: CacheStatus::Miss,
        })
    }

    async fn cache_lookup(&self, key: &CacheKey) -> Option<Bytes> {
        match self.cache.get(&key.render()).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(key = %key, error = %e, "Edge cache read failed, treating as miss");
                None
            }
        }
    }
}
