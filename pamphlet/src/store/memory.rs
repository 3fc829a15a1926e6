//! In-memory stores backed by `DashMap`.
//!
//! Used by tests and by `pamphlet serve --ephemeral`.

use bytes::Bytes;
use dashmap::DashMap;

use super::error::{StoreError, StoreResult};
use super::traits::{BlobStore, MetadataStore};
use super::version::next_version;
use crate::cache::BoxFuture;
use crate::model::{Metadata, PamphletId};

/// Blob store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<Bytes>>> {
        let value = self.blobs.get(key).map(|v| v.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn put(&self, key: &str, body: Bytes) -> BoxFuture<'_, StoreResult<()>> {
        self.blobs.insert(key.to_string(), body);
        Box::pin(async { Ok(()) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let existed = self.blobs.remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn delete_prefix(&self, prefix: &str) -> BoxFuture<'_, StoreResult<usize>> {
        let before = self.blobs.len();
        self.blobs.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.blobs.len());
        Box::pin(async move { Ok(removed) })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let exists = self.blobs.contains_key(key);
        Box::pin(async move { Ok(exists) })
    }
}

/// Metadata store held entirely in memory.
///
/// `bump_version` runs under the map's per-shard write lock, so concurrent
/// bumps of the same pamphlet serialize.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: DashMap<PamphletId, Metadata>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<Option<Metadata>>> {
        let value = self.records.get(id).map(|m| m.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn put(&self, id: &PamphletId, metadata: Metadata) -> BoxFuture<'_, StoreResult<()>> {
        self.records.insert(id.clone(), metadata);
        Box::pin(async { Ok(()) })
    }

    fn delete(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<bool>> {
        let existed = self.records.remove(id).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn bump_version(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<u64>> {
        let result = match self.records.get_mut(id) {
            Some(mut record) => {
                let version = next_version(Some(record.version));
                record.version = version;
                Ok(version)
            }
            None => Err(StoreError::NotFound(id.clone())),
        };
        Box::pin(async move { result })
    }
}
