//! Publishing tiled pages.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::model::{ContentHash, Metadata, PamphletId};
use crate::store::{keys, next_version, BlobStore, MetadataStore, StoreResult};
use crate::tiling::TiledImage;

/// Summary of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReport {
    pub id: PamphletId,
    pub version: u64,
    pub pages: usize,
    /// Tile entries across all pages.
    pub tiles_total: usize,
    /// Distinct blobs written.
    pub tiles_uploaded: usize,
    /// Distinct blobs already present.
    pub tiles_skipped: usize,
}

/// Writes tiled pages and their metadata into the durable tiers.
#[derive(Clone)]
pub struct Publisher {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
}

impl Publisher {
    pub fn new(blobs: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, metadata }
    }

    /// Store every unique tile blob and publish a new metadata version.
    ///
    /// Pages are numbered in the order given. Blobs already present under
    /// the same hash are not rewritten. Republishing an existing pamphlet
    /// always yields a version above the previous one.
    #[instrument(skip(self, pages), fields(pages = pages.len()))]
    pub async fn publish(
        &self,
        id: &PamphletId,
        tile_size: u32,
        pages: &[TiledImage],
    ) -> StoreResult<PublishReport> {
        let mut seen: HashSet<&ContentHash> = HashSet::new();
        let mut uploaded = 0;
        let mut skipped = 0;
        let mut total = 0;

        for page in pages {
            for tile in &page.tiles {
                total += 1;
                if !seen.insert(&tile.hash) {
                    continue;
                }

                let key = keys::tile_blob_key(id, &tile.hash);
                if self.blobs.exists(&key).await? {
                    skipped += 1;
                    continue;
                }
                self.blobs.put(&key, tile.bytes.clone()).await?;
                uploaded += 1;
                debug!(hash = %tile.hash.short(), size = tile.bytes.len(), "Stored tile blob");
            }
        }

        let previous = self.metadata.current_version(id).await?;
        let version = next_version(previous);
        let metadata = Metadata::new(
            version,
            tile_size,
            pages
                .iter()
                .enumerate()
                .map(|(n, page)| page.to_page(n as u32))
                .collect(),
        );

        self.metadata.put(id, metadata.clone()).await?;
        self.blobs
            .put(&keys::metadata_blob_key(id), metadata.to_json()?.into())
            .await?;

        info!(
            pamphlet = %id,
            version,
            uploaded,
            skipped,
            "Pamphlet published"
        );

        Ok(PublishReport {
            id: id.clone(),
            version,
            pages: pages.len(),
            tiles_total: total,
            tiles_uploaded: uploaded,
            tiles_skipped: skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::store::{MemoryBlobStore, MemoryMetadataStore};
    use crate::tiling::EncodedTile;

    fn tile(x: u32, y: u32, body: &'static [u8]) -> EncodedTile {
        EncodedTile {
            x,
            y,
            hash: ContentHash::of(body),
            bytes: Bytes::from_static(body),
        }
    }

    fn page(tiles: Vec<EncodedTile>) -> TiledImage {
        TiledImage {
            width: 512,
            height: 256,
            tile_size: 256,
            tiles,
        }
    }

    fn setup() -> (Publisher, Arc<MemoryBlobStore>, Arc<MemoryMetadataStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        (
            Publisher::new(blobs.clone(), metadata.clone()),
            blobs,
            metadata,
        )
    }

    #[tokio::test]
    async fn test_publish_dedupes_blobs() {
        let (publisher, blobs, metadata) = setup();
        let id = PamphletId::new("p1").unwrap();

        let pages = vec![
            page(vec![tile(0, 0, b"a"), tile(1, 0, b"b")]),
            page(vec![tile(0, 0, b"a"), tile(1, 0, b"c")]),
        ];
        let report = publisher.publish(&id, 256, &pages).await.unwrap();

        assert_eq!(report.tiles_total, 4);
        assert_eq!(report.tiles_uploaded, 3);
        assert_eq!(report.tiles_skipped, 0);
        // three tiles plus the mirrored metadata document
        assert_eq!(blobs.len(), 4);

        let stored = metadata.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.version, report.version);
        assert_eq!(stored.pages.len(), 2);
        assert_eq!(stored.pages[1].page_number, 1);
        assert_eq!(stored.unique_hashes().len(), 3);
    }

    #[tokio::test]
    async fn test_republish_skips_existing_and_bumps_version() {
        let (publisher, _blobs, _metadata) = setup();
        let id = PamphletId::new("p1").unwrap();

        let first = publisher
            .publish(&id, 256, &[page(vec![tile(0, 0, b"a")])])
            .await
            .unwrap();
        let second = publisher
            .publish(&id, 256, &[page(vec![tile(0, 0, b"a"), tile(1, 0, b"d")])])
            .await
            .unwrap();

        assert_eq!(second.tiles_skipped, 1);
        assert_eq!(second.tiles_uploaded, 1);
        assert!(second.version > first.version);
    }

    #[tokio::test]
    async fn test_publish_mirrors_metadata() {
        let (publisher, blobs, _metadata) = setup();
        let id = PamphletId::new("p1").unwrap();

        let report = publisher
            .publish(&id, 256, &[page(vec![tile(0, 0, b"a")])])
            .await
            .unwrap();

        let mirrored = blobs
            .get(&keys::metadata_blob_key(&id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            Metadata::from_json(&mirrored).unwrap().version,
            report.version
        );
    }
}
