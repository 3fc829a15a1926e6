//! Edge cache interface.
//!
//! Keys are rendered [`CacheKey`](super::CacheKey)s and values are response
//! bodies. Entries are written once per key and otherwise only expire, so the
//! interface has no update or compare-and-set operations.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use thiserror::Error;

/// Boxed future so [`Cache`] stays usable as `Arc<dyn Cache>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Edge cache failures. Callers on the read path treat any of these as a
/// miss; the background writer logs and counts them.
#[derive(Debug, Error)]
pub enum ServiceCacheError {
    #[error("body of {size} bytes exceeds the cache budget of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    #[error("cache backend error: {0}")]
    Provider(String),
}

/// Transient key-value tier in front of the blob store.
pub trait Cache: Send + Sync {
    /// Insert or replace an entry.
    fn set(&self, key: &str, value: Bytes) -> BoxFuture<'_, Result<(), ServiceCacheError>>;

    /// `Ok(None)` for keys never written or already expired.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Bytes>, ServiceCacheError>>;

    /// Remove an entry; `Ok(true)` when it was present.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

    fn contains(&self, key: &str) -> BoxFuture<'_, Result<bool, ServiceCacheError>>;

}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheKey, MemoryCacheProvider};
    use crate::model::{ContentHash, PamphletId};

    #[test]
    fn test_value_too_large_message() {
        let err = ServiceCacheError::ValueTooLarge { size: 100, max: 50 };
        assert_eq!(
            err.to_string(),
            "body of 100 bytes exceeds the cache budget of 50 bytes"
        );
    }

    #[tokio::test]
    async fn test_versions_are_separate_entries_behind_dyn_cache() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCacheProvider::new(1024, None));
        let id = PamphletId::new("p1").unwrap();
        let hash = ContentHash::of(b"tile");

        let v1 = CacheKey::tile(&id, &hash, 1).render();
        let v2 = CacheKey::tile(&id, &hash, 2).render();
        cache.set(&v1, Bytes::from_static(b"old")).await.unwrap();

        assert!(cache.get(&v2).await.unwrap().is_none());
        assert_eq!(
            cache.get(&v1).await.unwrap(),
            Some(Bytes::from_static(b"old"))
        );
    }
}
