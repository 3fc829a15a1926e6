//! Shared handler state.

use std::time::Duration;

use crate::gateway::TileGateway;
use crate::invalidation::InvalidationCoordinator;

use super::headers::DEFAULT_METADATA_MAX_AGE;

/// State handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: TileGateway,
    pub coordinator: InvalidationCoordinator,
    pub metadata_max_age: Duration,
}

impl AppState {
    pub fn new(gateway: TileGateway, coordinator: InvalidationCoordinator) -> Self {
        Self {
            gateway,
            coordinator,
            metadata_max_age: DEFAULT_METADATA_MAX_AGE,
        }
    }

    pub fn with_metadata_max_age(mut self, max_age: Duration) -> Self {
        self.metadata_max_age = max_age;
        self
    }
}
