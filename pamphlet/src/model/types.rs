//! Metadata, page and tile reference types.
//!
//! These mirror the JSON document served at `/pamphlet/{id}/metadata`:
//!
//! ```json
//! {
//!   "version": 1700000000000,
//!   "tile_size": 256,
//!   "pages": [
//!     { "page": 0, "width": 512, "height": 512,
//!       "tiles": [ { "x": 0, "y": 0, "hash": "..." } ] }
//!   ]
//! }
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ModelError;
use super::hash::ContentHash;

/// Maximum accepted length of a pamphlet identifier.
pub const MAX_PAMPHLET_ID_LEN: usize = 128;

/// Identifier of a pamphlet.
///
/// Restricted to ASCII alphanumerics, `-`, `_` and `.` (not leading) so the id
/// can be embedded verbatim in URLs, cache keys and storage paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PamphletId(String);

impl PamphletId {
    /// Validate and wrap a pamphlet identifier.
    pub fn new(id: impl Into<String>) -> Result<Self, ModelError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_PAMPHLET_ID_LEN
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if valid {
            Ok(Self(id))
        } else {
            Err(ModelError::InvalidPamphletId(id))
        }
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PamphletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PamphletId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for PamphletId {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PamphletId> for String {
    fn from(id: PamphletId) -> Self {
        id.0
    }
}

/// Zero-based grid position of a tile within a page, in units of `tile_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A tile entry in a page: where it sits and which blob holds its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRef {
    pub x: u32,
    pub y: u32,
    pub hash: ContentHash,
}

impl TileRef {
    pub fn new(x: u32, y: u32, hash: ContentHash) -> Self {
        Self { x, y, hash }
    }

    /// Grid coordinate of this tile.
    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.x, self.y)
    }
}

/// One page of a pamphlet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based page number.
    #[serde(rename = "page")]
    pub page_number: u32,
    /// Full page width in pixels.
    pub width: u32,
    /// Full page height in pixels.
    pub height: u32,
    pub tiles: Vec<TileRef>,
}

impl Page {
    /// Number of tile columns needed to cover the page.
    pub fn columns(&self, tile_size: u32) -> u32 {
        self.width.div_ceil(tile_size.max(1))
    }

    /// Number of tile rows needed to cover the page.
    pub fn rows(&self, tile_size: u32) -> u32 {
        self.height.div_ceil(tile_size.max(1))
    }

    /// Look up the tile at a grid position.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&TileRef> {
        self.tiles.iter().find(|t| t.x == coord.x && t.y == coord.y)
    }
}

/// The metadata document for a pamphlet.
///
/// `version` gates the validity of every cache entry derived from this
/// document: bumping it makes every previously issued cache key unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: u64,
    pub tile_size: u32,
    pub pages: Vec<Page>,
}

impl Metadata {
    pub fn new(version: u64, tile_size: u32, pages: Vec<Page>) -> Self {
        Self {
            version,
            tile_size,
            pages,
        }
    }

    /// Look up a page by its page number.
    pub fn page(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Every distinct tile hash referenced by this document.
    pub fn unique_hashes(&self) -> BTreeSet<ContentHash> {
        self.pages
            .iter()
            .flat_map(|p| p.tiles.iter().map(|t| t.hash.clone()))
            .collect()
    }

    /// Whether any page references the given hash.
    pub fn references(&self, hash: &ContentHash) -> bool {
        self.pages
            .iter()
            .any(|p| p.tiles.iter().any(|t| &t.hash == hash))
    }

    /// Total number of tile entries across all pages.
    pub fn tile_count(&self) -> usize {
        self.pages.iter().map(|p| p.tiles.len()).sum()
    }

    /// Copy of this document carrying a different version.
    pub fn with_version(&self, version: u64) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// Serialize to the JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, ModelError> {
        serde_json::to_vec(self).map_err(|e| ModelError::Document(e.to_string()))
    }

    /// Parse the JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ModelError> {
        serde_json::from_slice(bytes).map_err(|e| ModelError::Document(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(c: char) -> ContentHash {
        ContentHash::parse(&c.to_string().repeat(64)).unwrap()
    }

    fn sample() -> Metadata {
        Metadata::new(
            1,
            256,
            vec![Page {
                page_number: 0,
                width: 512,
                height: 512,
                tiles: vec![
                    TileRef::new(0, 0, hash('a')),
                    TileRef::new(1, 0, hash('b')),
                    TileRef::new(0, 1, hash('c')),
                    TileRef::new(1, 1, hash('a')),
                ],
            }],
        )
    }

    #[test]
    fn test_pamphlet_id_valid() {
        let id = PamphletId::new("spring-2024_v2.final").unwrap();
        assert_eq!(id.as_str(), "spring-2024_v2.final");
    }

    #[test]
    fn test_pamphlet_id_rejects_empty_and_paths() {
        assert!(PamphletId::new("").is_err());
        assert!(PamphletId::new("../etc").is_err());
        assert!(PamphletId::new("a/b").is_err());
        assert!(PamphletId::new(".hidden").is_err());
        assert!(PamphletId::new("x".repeat(MAX_PAMPHLET_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_json_wire_format() {
        let json: serde_json::Value = serde_json::from_slice(&sample().to_json().unwrap()).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["tile_size"], 256);
        assert_eq!(json["pages"][0]["page"], 0);
        assert_eq!(json["pages"][0]["tiles"][1]["x"], 1);
        assert_eq!(json["pages"][0]["tiles"][1]["hash"], "b".repeat(64));
    }

    #[test]
    fn test_from_json_roundtrip() {
        let metadata = sample();
        let parsed = Metadata::from_json(&metadata.to_json().unwrap()).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn test_from_json_rejects_bad_hash() {
        let raw = br#"{"version":1,"tile_size":256,"pages":[{"page":0,"width":1,"height":1,"tiles":[{"x":0,"y":0,"hash":"zz"}]}]}"#;
        assert!(matches!(
            Metadata::from_json(raw),
            Err(ModelError::Document(_))
        ));
    }

    #[test]
    fn test_unique_hashes_dedupes() {
        let metadata = sample();
        assert_eq!(metadata.tile_count(), 4);
        assert_eq!(metadata.unique_hashes().len(), 3);
        assert!(metadata.references(&hash('c')));
        assert!(!metadata.references(&hash('d')));
    }

    #[test]
    fn test_page_grid_dimensions() {
        let page = Page {
            page_number: 0,
            width: 600,
            height: 256,
            tiles: vec![],
        };
        assert_eq!(page.columns(256), 3);
        assert_eq!(page.rows(256), 1);
    }

    #[test]
    fn test_tile_at() {
        let metadata = sample();
        let page = metadata.page(0).unwrap();
        assert_eq!(page.tile_at(TileCoord::new(1, 0)).unwrap().hash, hash('b'));
        assert!(page.tile_at(TileCoord::new(5, 5)).is_none());
        assert!(metadata.page(3).is_none());
    }

    #[test]
    fn test_with_version_keeps_pages() {
        let bumped = sample().with_version(9);
        assert_eq!(bumped.version, 9);
        assert_eq!(bumped.pages, sample().pages);
    }
}
