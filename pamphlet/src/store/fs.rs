//! Filesystem-backed stores.
//!
//! Blob keys map onto relative paths below a root directory; metadata
//! records are JSON documents named `{id}.json`. Every write goes to a
//! sibling temp file first and is renamed into place, so readers never see
//! a partial file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::traits::{BlobStore, MetadataStore};
use super::version::next_version;
use crate::cache::BoxFuture;
use crate::model::{Metadata, PamphletId};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Path helpers
// ============================================================================

/// Map a slash-separated key onto a path below `root`.
///
/// Rejects empty segments and any segment starting with `.`, which rules
/// out traversal and collisions with temp files.
fn key_path(root: &Path, key: &str) -> StoreResult<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in key.split('/') {
        let valid = !segment.is_empty()
            && !segment.starts_with('.')
            && !segment.contains('\\')
            && !segment.contains('\0');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        path.push(segment);
    }
    Ok(path)
}

async fn write_atomic(path: &Path, body: &[u8]) -> StoreResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
    fs::create_dir_all(parent)
        .await
        .map_err(|e| StoreError::io(parent, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = parent.join(format!(
        ".{}.tmp-{}",
        file_name,
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&temp, body)
        .await
        .map_err(|e| StoreError::io(&temp, e))?;
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(StoreError::io(path, e));
    }
    Ok(())
}

async fn read_optional(path: &Path) -> StoreResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

async fn remove_optional(path: &Path) -> StoreResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Every file below `dir`, as slash-separated keys relative to `root`.
async fn walk_keys(root: &Path, dir: &Path) -> StoreResult<Vec<String>> {
    let mut keys = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(StoreError::io(&current, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&current, e))?
        {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io(&path, e))?;
            if file_type.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
    }

    Ok(keys)
}

// ============================================================================
// FsBlobStore
// ============================================================================

/// Blob store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobStore for FsBlobStore {
    fn get(&self, key: &str) -> BoxFuture<'_, StoreResult<Option<Bytes>>> {
        let path = key_path(&self.root, key);
        Box::pin(async move { Ok(read_optional(&path?).await?.map(Bytes::from)) })
    }

    fn put(&self, key: &str, body: Bytes) -> BoxFuture<'_, StoreResult<()>> {
        let path = key_path(&self.root, key);
        Box::pin(async move { write_atomic(&path?, &body).await })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let path = key_path(&self.root, key);
        Box::pin(async move { remove_optional(&path?).await })
    }

    fn delete_prefix(&self, prefix: &str) -> BoxFuture<'_, StoreResult<usize>> {
        let prefix = prefix.to_string();
        Box::pin(async move {
            // Only walk the deepest directory the prefix fully names
            let dir_part = match prefix.rfind('/') {
                Some(idx) => &prefix[..idx],
                None => "",
            };
            let dir = if dir_part.is_empty() {
                self.root.clone()
            } else {
                key_path(&self.root, dir_part)?
            };

            let mut removed = 0;
            for key in walk_keys(&self.root, &dir).await? {
                if key.starts_with(&prefix) && remove_optional(&self.root.join(&key)).await? {
                    removed += 1;
                }
            }

            if prefix.ends_with('/') && !dir_part.is_empty() {
                match fs::remove_dir_all(&dir).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(StoreError::io(&dir, e)),
                }
            }

            debug!(prefix = %prefix, removed, "Deleted blobs by prefix");
            Ok(removed)
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StoreResult<bool>> {
        let path = key_path(&self.root, key);
        Box::pin(async move {
            let path = path?;
            match fs::metadata(&path).await {
                Ok(meta) => Ok(meta.is_file()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(StoreError::io(&path, e)),
            }
        })
    }
}

// ============================================================================
// FsMetadataStore
// ============================================================================

/// Metadata store keeping one JSON document per pamphlet.
///
/// Writes and version bumps are serialized through an async mutex, which
/// makes `bump_version` atomic for every caller sharing this instance.
#[derive(Debug)]
pub struct FsMetadataStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FsMetadataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, id: &PamphletId) -> PathBuf {
        self.root.join(format!("{}.json", id))
    }

    async fn read_record(&self, id: &PamphletId) -> StoreResult<Option<Metadata>> {
        match read_optional(&self.record_path(id)).await? {
            Some(bytes) => Ok(Some(Metadata::from_json(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn write_record(&self, id: &PamphletId, metadata: &Metadata) -> StoreResult<()> {
        write_atomic(&self.record_path(id), &metadata.to_json()?).await
    }
}

impl MetadataStore for FsMetadataStore {
    fn get(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<Option<Metadata>>> {
        let id = id.clone();
        Box::pin(async move { self.read_record(&id).await })
    }

    fn put(&self, id: &PamphletId, metadata: Metadata) -> BoxFuture<'_, StoreResult<()>> {
        let id = id.clone();
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            self.write_record(&id, &metadata).await
        })
    }

    fn delete(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<bool>> {
        let id = id.clone();
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            remove_optional(&self.record_path(&id)).await
        })
    }

    fn bump_version(&self, id: &PamphletId) -> BoxFuture<'_, StoreResult<u64>> {
        let id = id.clone();
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let record = self
                .read_record(&id)
                .await?
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;

            let version = next_version(Some(record.version));
            self.write_record(&id, &record.with_version(version)).await?;
            Ok(version)
        })
    }
}
