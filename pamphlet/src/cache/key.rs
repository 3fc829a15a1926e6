//! Versioned cache keys.
//!
//! Every edge cache entry is keyed by `(pamphlet id, resource, version)`.
//! Bumping a pamphlet's metadata version therefore moves every reader onto a
//! fresh key family; the old entries are never addressed again and simply
//! expire.
//!
//! # Key Format
//!
//! - Metadata: `pamphlet:{id}:metadata:v{version}`
//! - Tile: `pamphlet:{id}:tile:{hash}:v{version}`

use std::fmt;

use crate::model::{ContentHash, PamphletId};

/// The resource a cache key refers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheResource {
    /// The pamphlet's metadata document.
    Metadata,
    /// A tile blob.
    Tile(ContentHash),
}

impl fmt::Display for CacheResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheResource::Metadata => f.write_str("metadata"),
            CacheResource::Tile(hash) => write!(f, "tile:{}", hash),
        }
    }
}

/// A versioned edge cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub pamphlet_id: PamphletId,
    pub resource: CacheResource,
    pub version: u64,
}

impl CacheKey {
    /// Key for a pamphlet's metadata at a version.
    pub fn metadata(pamphlet_id: &PamphletId, version: u64) -> Self {
        Self {
            pamphlet_id: pamphlet_id.clone(),
            resource: CacheResource::Metadata,
            version,
        }
    }

    /// Key for a tile as referenced by a metadata version.
    pub fn tile(pamphlet_id: &PamphletId, hash: &ContentHash, version: u64) -> Self {
        Self {
            pamphlet_id: pamphlet_id.clone(),
            resource: CacheResource::Tile(hash.clone()),
            version,
        }
    }

    /// Rendered key as stored in the cache.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pamphlet:{}:{}:v{}",
            self.pamphlet_id, self.resource, self.version
        )
    }
}
