//! Version bumps and pamphlet deletion.
//!
//! Invalidation never evicts tile entries from the edge cache. Bumping the
//! version moves every reader onto a new key family; entries under the old
//! version are unreachable and expire by TTL.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::{Cache, CacheKey};
use crate::model::PamphletId;
use crate::store::{keys, BlobStore, MetadataStore, StoreError, StoreResult};

/// Status reported for tile cache entries on deletion.
pub const TILE_CACHES_TTL_BOUND: &str = "not deleted, TTL-bound";

/// Outcome of an invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationResult {
    pub id: PamphletId,
    pub version: u64,
    pub status: String,
}

/// What a deletion removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedResources {
    /// Number of blobs removed from the durable store.
    pub blobs: usize,
    /// Whether the current metadata cache entry was removed.
    pub metadata_cache: bool,
    pub tile_caches: String,
}

/// Outcome of a pamphlet deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionReport {
    pub id: PamphletId,
    pub status: String,
    pub deleted: DeletedResources,
}

/// Coordinates version bumps and deletions across the storage tiers.
#[derive(Clone)]
pub struct InvalidationCoordinator {
    cache: Arc<dyn Cache>,
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl InvalidationCoordinator {
    pub fn new(
        cache: Arc<dyn Cache>,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            cache,
            blobs,
            metadata,
        }
    }

    /// Advance the pamphlet's version and re-publish its metadata.
    ///
    /// The bump is atomic in the metadata store, so concurrent invalidations
    /// each receive a distinct, increasing version.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, id: &PamphletId) -> StoreResult<InvalidationResult> {
        let version = self.metadata.bump_version(id).await?;

        // Mirror whatever is current now; a concurrent bump may already have
        // moved past `version`, in which case the newer document wins.
        let metadata = self
            .metadata
            .get(id)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.blobs
            .put(&keys::metadata_blob_key(id), metadata.to_json()?.into())
            .await?;

        info!(pamphlet = %id, version, "Pamphlet invalidated");

        Ok(InvalidationResult {
            id: id.clone(),
            version,
            status: "ok".to_string(),
        })
    }

    /// Remove a pamphlet's metadata and every blob it owns.
    ///
    /// Tile cache entries are left to expire. Fails with `NotFound` only when
    /// there was nothing to delete at all.
    #[instrument(skip(self))]
    pub async fn delete_pamphlet(&self, id: &PamphletId) -> StoreResult<DeletionReport> {
        let version = self.metadata.current_version(id).await?;

        let metadata_cache = match version {
            Some(version) => {
                let key = CacheKey::metadata(id, version);
                match self.cache.delete(&key.render()).await {
                    Ok(removed) => removed,
                    Err(e) => {
                        warn!(key = %key, error = %e, "Failed to delete metadata cache entry");
                        false
                    }
                }
            }
            None => false,
        };

        let blobs = self.blobs.delete_prefix(&keys::pamphlet_prefix(id)).await?;
        let had_record = self.metadata.delete(id).await?;

        if !had_record && blobs == 0 {
            return Err(StoreError::NotFound(id.clone()));
        }

        info!(pamphlet = %id, blobs, metadata_cache, "Pamphlet deleted");

        Ok(DeletionReport {
            id: id.clone(),
            status: "deleted".to_string(),
            deleted: DeletedResources {
                blobs,
                metadata_cache,
                tile_caches: TILE_CACHES_TTL_BOUND.to_string(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::cache::MemoryCacheProvider;
    use crate::model::{ContentHash, Metadata};
    use crate::store::{MemoryBlobStore, MemoryMetadataStore};

    struct Fixture {
        coordinator: InvalidationCoordinator,
        cache: Arc<MemoryCacheProvider>,
        blobs: Arc<MemoryBlobStore>,
        metadata: Arc<MemoryMetadataStore>,
    }

    async fn fixture() -> Fixture {
        let cache = Arc::new(MemoryCacheProvider::new(1_000_000, None));
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());

        let id = id();
        metadata
            .put(&id, Metadata::new(5, 256, vec![]))
            .await
            .unwrap();
        let hash = ContentHash::of(b"t");
        blobs
            .put(&keys::tile_blob_key(&id, &hash), Bytes::from_static(b"t"))
            .await
            .unwrap();

        Fixture {
            coordinator: InvalidationCoordinator::new(
                cache.clone(),
                blobs.clone(),
                metadata.clone(),
            ),
            cache,
            blobs,
            metadata,
        }
    }

    fn id() -> PamphletId {
        PamphletId::new("p1").unwrap()
    }

    #[tokio::test]
    async fn test_invalidate_twice_yields_increasing_versions() {
        let f = fixture().await;

        let first = f.coordinator.invalidate(&id()).await.unwrap();
        let second = f.coordinator.invalidate(&id()).await.unwrap();

        assert!(first.version > 5);
        assert!(second.version > first.version);
        assert_eq!(first.status, "ok");
        assert_eq!(
            f.metadata.current_version(&id()).await.unwrap(),
            Some(second.version)
        );
    }

    #[tokio::test]
    async fn test_invalidate_mirrors_metadata_to_blob_store() {
        let f = fixture().await;
        let result = f.coordinator.invalidate(&id()).await.unwrap();

        let mirrored = f
            .blobs
            .get(&keys::metadata_blob_key(&id()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(Metadata::from_json(&mirrored).unwrap().version, result.version);
    }

    #[tokio::test]
    async fn test_invalidate_leaves_tile_cache_alone() {
        let f = fixture().await;
        let key = CacheKey::tile(&id(), &ContentHash::of(b"t"), 5).render();
        f.cache.set(&key, Bytes::from_static(b"t")).await.unwrap();

        f.coordinator.invalidate(&id()).await.unwrap();
        assert!(f.cache.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_missing_pamphlet() {
        let f = fixture().await;
        let err = f
            .coordinator
            .invalidate(&PamphletId::new("ghost").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_pamphlet_report() {
        let f = fixture().await;
        f.cache
            .set(
                &CacheKey::metadata(&id(), 5).render(),
                Bytes::from_static(b"{}"),
            )
            .await
            .unwrap();
        f.coordinator.invalidate(&id()).await.unwrap();

        // The metadata entry for the old version is no longer current
        let report = f.coordinator.delete_pamphlet(&id()).await.unwrap();
        assert_eq!(report.status, "deleted");
        assert_eq!(report.deleted.blobs, 2);
        assert!(!report.deleted.metadata_cache);
        assert_eq!(report.deleted.tile_caches, TILE_CACHES_TTL_BOUND);

        assert!(f.blobs.is_empty());
        assert!(f.metadata.get(&id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_current_metadata_cache_entry() {
        let f = fixture().await;
        let key = CacheKey::metadata(&id(), 5).render();
        f.cache.set(&key, Bytes::from_static(b"{}")).await.unwrap();

        let report = f.coordinator.delete_pamphlet(&id()).await.unwrap();
        assert!(report.deleted.metadata_cache);
        assert!(!f.cache.contains(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let f = fixture().await;
        f.coordinator.delete_pamphlet(&id()).await.unwrap();
        assert!(matches!(
            f.coordinator.delete_pamphlet(&id()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_deletion_report_wire_format() {
        let report = DeletionReport {
            id: id(),
            status: "deleted".to_string(),
            deleted: DeletedResources {
                blobs: 3,
                metadata_cache: true,
                tile_caches: TILE_CACHES_TTL_BOUND.to_string(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["id"], "p1");
        assert_eq!(json["deleted"]["blobs"], 3);
        assert_eq!(json["deleted"]["tile_caches"], "not deleted, TTL-bound");
    }
}
