//! Helpers shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use pamphlet::model::PamphletId;
use pamphlet::store::{BlobStore, FsBlobStore, FsMetadataStore, MetadataStore};

use crate::error::CliError;

/// Durable stores rooted at a storage directory.
pub struct Stores {
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
}

/// Open the filesystem stores under `dir`: blobs in `dir/blobs`, metadata
/// documents in `dir/metadata`.
pub fn open_fs_stores(dir: &Path) -> Stores {
    Stores {
        blobs: Arc::new(FsBlobStore::new(dir.join("blobs"))),
        metadata: Arc::new(FsMetadataStore::new(dir.join("metadata"))),
    }
}

pub fn parse_id(raw: &str) -> Result<PamphletId, CliError> {
    PamphletId::new(raw).map_err(|e| CliError::InvalidArgument(e.to_string()))
}

/// Parse `WIDTHxHEIGHT`, e.g. `1920x1080`.
pub fn parse_size(raw: &str) -> Result<(f64, f64), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", raw))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
            .ok_or_else(|| format!("invalid dimension '{}'", part))
    };
    Ok((parse(w)?, parse(h)?))
}

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
