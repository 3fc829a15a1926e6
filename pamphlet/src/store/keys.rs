//! Blob store key layout.
//!
//! ```text
//! {id}/metadata.json      mirrored metadata document
//! {id}/tiles/{hash}       tile blob, addressed by content hash only
//! ```
//!
//! Everything a pamphlet owns lives under `{id}/`, so deletion is a single
//! prefix delete.

use crate::model::{ContentHash, PamphletId};

/// Key of the mirrored metadata document.
pub fn metadata_blob_key(id: &PamphletId) -> String {
    format!("{}/metadata.json", id)
}

/// Key of a tile blob.
pub fn tile_blob_key(id: &PamphletId, hash: &ContentHash) -> String {
    format!("{}/tiles/{}", id, hash)
}

/// Prefix covering every blob a pamphlet owns.
pub fn pamphlet_prefix(id: &PamphletId) -> String {
    format!("{}/", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_share_pamphlet_prefix() {
        let id = PamphletId::new("p1").unwrap();
        let hash = ContentHash::of(b"tile");
        let prefix = pamphlet_prefix(&id);

        assert_eq!(metadata_blob_key(&id), "p1/metadata.json");
        assert_eq!(tile_blob_key(&id, &hash), format!("p1/tiles/{}", hash));
        assert!(metadata_blob_key(&id).starts_with(&prefix));
        assert!(tile_blob_key(&id, &hash).starts_with(&prefix));
    }

    #[test]
    fn test_prefix_does_not_match_longer_ids() {
        let short = PamphletId::new("p1").unwrap();
        let long = PamphletId::new("p10").unwrap();
        assert!(!metadata_blob_key(&long).starts_with(&pamphlet_prefix(&short)));
    }
}
