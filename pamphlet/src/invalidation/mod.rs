//! Write path: publishing, invalidation and deletion.

mod coordinator;
mod publisher;

pub use coordinator::{
    DeletedResources, DeletionReport, InvalidationCoordinator, InvalidationResult,
    TILE_CACHES_TTL_BOUND,
};
pub use publisher::{PublishReport, Publisher};
