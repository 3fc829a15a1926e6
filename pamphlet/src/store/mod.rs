//! Durable storage tier.
//!
//! The blob store holds tile bytes and a mirror of each metadata document;
//! the metadata store holds the authoritative record and its version
//! counter. Memory and filesystem backends are provided for both.

mod error;
mod fs;
pub mod keys;
mod memory;
mod traits;
mod version;

pub use error::{StoreError, StoreResult};
pub use fs::{FsBlobStore, FsMetadataStore};
pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use traits::{BlobStore, MetadataStore};
pub use version::next_version;
