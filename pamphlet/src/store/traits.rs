//! Durable storage interfaces.
//!
//! Two collaborators back the server:
//!
//! - [`BlobStore`]: opaque bytes by key, strongly consistent per key. Holds
//!   tile blobs and a mirror of each metadata document.
//! - [`MetadataStore`]: the authoritative metadata record per pamphlet,
//!   read-after-write consistent. Owns the version counter.
//!
//! Both traits are dyn-compatible so the server can hold them as
//! `Arc<dyn ...>` and swap backends from configuration.

use bytes::Bytes;

use super::error::StoreResult;
use crate::cache::BoxFuture;
use crate::model::{Metadata, PamphletId};

/// Durable blob storage.
pub trait BlobStore: Send + Sync {
    /// Fetch a blob. `Ok(None)` when absent.
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<Bytes>>>;

    /// Store a blob, replacing any existing value.
    fn put(&self, key: &str, body: Bytes) -> BoxFuture<'_, StoreResult<()>>;

    /// Delete a blob. Returns `true` if it existed.
    fn delete(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>>;

    /// Delete every blob whose key starts with `prefix`.
    ///
    /// Returns the number of blobs removed.
    fn delete_prefix(&self, prefix: &str) -> BoxFuture<'_, StoreResult<usize>>;

    /// Whether a blob exists.
    fn exists(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>>;
}

/// Authoritative metadata records.
pub trait MetadataStore: Send + Sync {
    /// Fetch the current metadata for a pamphlet.
    fn get(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<Option<Metadata>>>;

    /// Replace the metadata for a pamphlet.
    fn put(&self, id: &PamphletId, metadata: Metadata) -> BoxFuture<'_, StoreResult<()>>;

    /// Delete the metadata record. Returns `true` if it existed.
    fn delete(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<bool>>;

    /// Atomically advance the stored version and return the new value.
    ///
    /// Fails with [`StoreError::NotFound`](super::StoreError::NotFound) when
    /// the pamphlet has no record. Concurrent bumps each observe a distinct,
    /// strictly increasing version.
    fn bump_version(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<u64>>;

    /// Current version, if the pamphlet exists.
    fn current_version(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<Option<u64>>> {
        let id = id.clone();
        Box::pin(async move { Ok(self.get(&id).await?.map(|m| m.version)) })
    }
}
