//! Transient edge cache tier.
//!
//! The edge cache sits in front of the durable blob store. It is addressed
//! only through versioned [`CacheKey`]s, so invalidation never touches it
//! directly: bumping a pamphlet's version makes every old key unreachable and
//! the TTL reclaims the space.
//!
//! # Components
//!
//! - [`Cache`]: dyn-compatible key-value interface
//! - [`MemoryCacheProvider`]: moka-backed LRU with TTL
//! - [`CacheKey`]: the versioned key scheme
//! - [`CacheWriter`]: background repopulation queue

mod key;
pub mod providers;
mod traits;
mod writer;

pub use key::{CacheKey, CacheResource};
pub use providers::MemoryCacheProvider;
pub use traits::{BoxFuture, Cache, ServiceCacheError};
pub use writer::{CacheWriter, WriterStats, DEFAULT_WRITE_QUEUE_CAPACITY};
