//! Pamphlet - very large page images served as content-addressed tiles.
//!
//! A pamphlet is a sequence of pages, each cut into square tiles that are
//! stored by the SHA-256 of their bytes. A versioned metadata document maps
//! tile coordinates to hashes. This crate covers the whole pipeline:
//!
//! - [`tiling`] cuts page images into tiles
//! - [`invalidation`] publishes, invalidates and deletes pamphlets
//! - [`store`] holds tile blobs and metadata documents
//! - [`cache`] is the versioned edge cache in front of the stores
//! - [`gateway`] serves reads through the edge cache
//! - [`server`] exposes the gateway over HTTP
//! - [`viewport`] decides which tiles a viewer can see
//! - [`client`] fetches tiles with bounded concurrency and deduplication

pub mod cache;
pub mod client;
pub mod config;
pub mod gateway;
pub mod invalidation;
pub mod logging;
pub mod model;
pub mod server;
pub mod store;
pub mod tiling;
pub mod viewport;

/// Crate version, reported by the health check.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
