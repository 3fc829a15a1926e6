//! Tile identity and metadata model.
//!
//! A tile's address is `(pamphlet id, content hash)`. Its grid position lives
//! only in the metadata document, so the same blob can appear at several
//! positions, on several pages, or across metadata versions without being
//! stored twice.

mod error;
mod hash;
mod pages;
mod types;

pub use error::ModelError;
pub use hash::{ContentHash, HASH_HEX_LEN};
pub use pages::{MetadataPage, PageRange};
pub use types::{Metadata, PamphletId, Page, TileCoord, TileRef, MAX_PAMPHLET_ID_LEN};
