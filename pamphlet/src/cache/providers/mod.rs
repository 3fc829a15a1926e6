//! Edge cache provider implementations.
//!
//! - [`MemoryCacheProvider`]: In-memory LRU cache with TTL using moka

mod memory;

pub use memory::MemoryCacheProvider;
