//! Bounded-concurrency tile loader.
//!
//! Each tile URL moves through a small state machine:
//!
//! ```text
//! Idle ──request──► Queued ──slot free──► Running ──ok──► Cached
//!                     │                      │
//!                     │ epoch advanced       └──err──► Failed (not cached)
//!                     ▼
//!                 Superseded
//! ```
//!
//! - At most `max_concurrent` fetches run at once.
//! - Among queued URLs the highest priority starts first; ties are FIFO.
//! - Requests for a URL that is already queued or running attach to it and
//!   receive the same result through a per-URL list of oneshot channels.
//! - Queued URLs carry the viewport epoch they were last requested in.
//!   After [`TileLoader::advance_epoch`] stale URLs are dropped when they
//!   surface instead of being fetched.
//!
//! Successful images go into a bounded session cache (moka, sized by tile
//! count). Failures are never cached.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use moka::sync::Cache as MokaCache;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::error::{LoadError, LoadResult};
use super::fetcher::TileFetcher;
use super::tile_image::TileImage;
use super::queue::LoadQueue;
use super::tile_url;
use crate::model::{PamphletId, TileCoord, TileRef};
use crate::viewport::Priority;

/// Default number of concurrent fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 6;

/// Default session cache capacity in tiles.
pub const DEFAULT_SESSION_CACHE_TILES: u64 = 512;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8787";

// =============================================================================
// Configuration
// =============================================================================

/// Tile loader configuration.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Base URL tile paths are appended to.
    pub api_base: String,
    /// Maximum fetches in flight.
    pub max_concurrent: usize,
    /// Session cache capacity in tiles.
    pub cache_capacity: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            cache_capacity: DEFAULT_SESSION_CACHE_TILES,
        }
    }
}

impl LoaderConfig {
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_cache_capacity(mut self, tiles: u64) -> Self {
        self.cache_capacity = tiles;
        self
    }
}

/// Snapshot of loader activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoaderStats {
    /// Tiles in the session cache.
    pub cached: u64,
    /// URLs queued or running.
    pub pending: usize,
    /// URLs waiting for a fetch slot.
    pub queued: usize,
    /// Fetches in flight.
    pub running: usize,
    /// Current viewport epoch.
    pub epoch: u64,
}

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Queued,
    Running,
}

type Waiter = oneshot::Sender<LoadResult<TileImage>>;

struct Pending {
    phase: Phase,
    priority: Priority,
    epoch: u64,
    waiters: Vec<Waiter>,
}

#[derive(Default)]
struct State {
    queue: LoadQueue,
    pending: HashMap<String, Pending>,
    running: usize,
}

struct Inner<F> {
    fetcher: F,
    config: LoaderConfig,
    cache: MokaCache<String, TileImage>,
    state: Mutex<State>,
    epoch: AtomicU64,
}

/// Outcome of registering interest in a URL.
enum Request {
    Cached(TileImage),
    Waiting(oneshot::Receiver<LoadResult<TileImage>>),
}

/// What the scheduler decided to do with a popped queue entry.
enum Dispatch {
    Start(String),
    Supersede(Vec<Waiter>),
    Skip,
}

impl<F: TileFetcher> Inner<F> {
    /// Attach to or enqueue a URL. Returns the cached image when present.
    fn request(&self, url: &str, priority: Priority) -> Request {
        let mut state = self.state.lock();

        // Checked under the lock: completions insert before leaving `pending`
        if let Some(image) = self.cache.get(url) {
            return Request::Cached(image);
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let state = &mut *state;

        match state.pending.get_mut(url) {
            Some(pending) => {
                pending.waiters.push(tx);
                pending.epoch = pending.epoch.max(epoch);
                if pending.phase == Phase::Queued && priority > pending.priority {
                    pending.priority = priority;
                    state.queue.push(url.to_string(), priority);
                }
                trace!(url, waiters = pending.waiters.len(), "Attached to pending load");
            }
            None => {
                state.pending.insert(
                    url.to_string(),
                    Pending {
                        phase: Phase::Queued,
                        priority,
                        epoch,
                        waiters: vec![tx],
                    },
                );
                state.queue.push(url.to_string(), priority);
            }
        }

        Request::Waiting(rx)
    }

    /// Start queued fetches until the concurrency limit is reached.
    fn pump(self: &Arc<Self>) {
        let max = self.config.max_concurrent.max(1);

        loop {
            let dispatch = {
                let mut state = self.state.lock();
                if state.running >= max {
                    return;
                }
                let Some(next) = state.queue.pop() else {
                    return;
                };

                let current_epoch = self.epoch.load(Ordering::SeqCst);
                match state.pending.get_mut(&next.url) {
                    // Entries left behind by a priority raise, or for URLs
                    // already running or finished
                    Some(p) if p.phase != Phase::Queued || p.priority != next.priority => {
                        Dispatch::Skip
                    }
                    None => Dispatch::Skip,
                    Some(p) if p.epoch < current_epoch => {
                        let waiters = std::mem::take(&mut p.waiters);
                        state.pending.remove(&next.url);
                        debug!(url = %next.url, "Dropping load from stale viewport");
                        Dispatch::Supersede(waiters)
                    }
                    Some(p) => {
                        p.phase = Phase::Running;
                        state.running += 1;
                        Dispatch::Start(next.url)
                    }
                }
            };

            match dispatch {
                Dispatch::Start(url) => {
                    let inner = Arc::clone(self);
                    tokio::spawn(async move { inner.run_fetch(url).await });
                }
                Dispatch::Supersede(waiters) => {
                    for waiter in waiters {
                        let _ = waiter.send(Err(LoadError::Superseded));
                    }
                }
                Dispatch::Skip => {}
            }
        }
    }

    async fn run_fetch(self: Arc<Self>, url: String) {
        trace!(url = %url, "Fetch started");
        let result = self.fetcher.fetch(&url).await;

        let waiters = {
            let mut state = self.state.lock();
            if let Ok(image) = &result {
                self.cache.insert(url.clone(), image.clone());
            }
            state.running = state.running.saturating_sub(1);
            state
                .pending
                .remove(&url)
                .map(|p| p.waiters)
                .unwrap_or_default()
        };

        match &result {
            Ok(_) => debug!(url = %url, waiters = waiters.len(), "Tile loaded"),
            Err(e) => warn!(url = %url, error = %e, "Tile fetch failed"),
        }

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }

        self.pump();
    }
}

// =============================================================================
// TileLoader
// =============================================================================

/// Priority-ordered, deduplicating tile loader with a session cache.
///
/// Cloning shares the same queue, cache and concurrency budget. Must be used
/// from within a tokio runtime.
pub struct TileLoader<F> {
    inner: Arc<Inner<F>>,
}

impl<F> Clone for TileLoader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: TileFetcher> TileLoader<F> {
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.cache_capacity)
            .build();
        Self {
            inner: Arc::new(Inner {
                fetcher,
                config,
                cache,
                state: Mutex::new(State::default()),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    /// Load one tile of a pamphlet.
    pub async fn load_tile(
        &self,
        pamphlet_id: &PamphletId,
        tile: &TileRef,
        priority: Priority,
    ) -> LoadResult<TileImage> {
        let url = tile_url(&self.inner.config.api_base, pamphlet_id, &tile.hash);
        self.load_url(&url, priority).await
    }

    /// Load a tile by URL.
    pub async fn load_url(&self, url: &str, priority: Priority) -> LoadResult<TileImage> {
        let rx = match self.inner.request(url, priority) {
            Request::Cached(image) => return Ok(image),
            Request::Waiting(rx) => rx,
        };
        self.inner.pump();
        rx.await.unwrap_or(Err(LoadError::Cancelled))
    }

    /// Load many tiles at one priority.
    ///
    /// Failed tiles are logged and left out of the result.
    pub async fn load_tiles(
        &self,
        pamphlet_id: &PamphletId,
        tiles: &[TileRef],
        priority: Priority,
    ) -> HashMap<TileCoord, TileImage> {
        let requests: Vec<_> = tiles.iter().map(|t| (t.clone(), priority)).collect();
        self.load_prioritized(pamphlet_id, &requests).await
    }

    /// Load many tiles, each at its own priority.
    ///
    /// Failed tiles are logged and left out of the result.
    pub async fn load_prioritized(
        &self,
        pamphlet_id: &PamphletId,
        tiles: &[(TileRef, Priority)],
    ) -> HashMap<TileCoord, TileImage> {
        let loads = tiles.iter().map(|(tile, priority)| async move {
            (tile.coord(), self.load_tile(pamphlet_id, tile, *priority).await)
        });

        let mut images = HashMap::with_capacity(tiles.len());
        for (coord, result) in join_all(loads).await {
            match result {
                Ok(image) => {
                    images.insert(coord, image);
                }
                Err(LoadError::Superseded) => {
                    debug!(tile = %coord, "Tile load superseded");
                }
                Err(e) => {
                    warn!(tile = %coord, error = %e, "Failed to load tile");
                }
            }
        }
        images
    }

    /// Start a new viewport epoch. Queued loads from earlier epochs are
    /// dropped unless requested again.
    pub fn advance_epoch(&self) -> u64 {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Cached image for a URL, if present.
    pub fn cached(&self, url: &str) -> Option<TileImage> {
        self.inner.cache.get(url)
    }

    /// Drop every cached tile. Pending loads are unaffected.
    pub fn clear_cache(&self) {
        self.inner.cache.invalidate_all();
        self.inner.cache.run_pending_tasks();
    }

    pub fn stats(&self) -> LoaderStats {
        self.inner.cache.run_pending_tasks();
        let state = self.inner.state.lock();
        LoaderStats {
            cached: self.inner.cache.entry_count(),
            pending: state.pending.len(),
            queued: state
                .pending
                .values()
                .filter(|p| p.phase == Phase::Queued)
                .count(),
            running: state.running,
            epoch: self.inner.epoch.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Semaphore;

    use super::*;
    use crate::client::fetcher::tests::MockFetcher;
    use crate::model::ContentHash;

    fn id() -> PamphletId {
        PamphletId::new("p1").unwrap()
    }

    fn tile(n: u32) -> TileRef {
        TileRef::new(n, 0, ContentHash::of(&n.to_le_bytes()))
    }

    fn url_of(n: u32) -> String {
        tile_url(DEFAULT_API_BASE, &id(), &tile(n).hash)
    }

    fn loader(fetcher: MockFetcher, max_concurrent: usize) -> TileLoader<MockFetcher> {
        TileLoader::new(
            fetcher,
            LoaderConfig::default().with_max_concurrent(max_concurrent),
        )
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_never_exceeds_max_concurrent() {
        let loader = loader(MockFetcher::with_delay(Duration::from_millis(10)), 3);
        let tiles: Vec<_> = (0..20).map(tile).collect();

        let images = loader.load_tiles(&id(), &tiles, Priority::VISIBLE).await;

        assert_eq!(images.len(), 20);
        assert_eq!(loader.fetcher().max_in_flight(), 3);
        assert_eq!(loader.stats().running, 0);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_fetch() {
        let loader = loader(MockFetcher::with_delay(Duration::from_millis(20)), 6);
        let (pid, t) = (id(), tile(1));

        let results = join_all((0..10).map(|_| loader.load_tile(&pid, &t, Priority::VISIBLE))).await;

        assert_eq!(loader.fetcher().call_count(&url_of(1)), 1);
        let first = results[0].as_ref().unwrap().bytes().clone();
        for result in &results {
            assert_eq!(result.as_ref().unwrap().bytes(), &first);
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_failure() {
        let fetcher = MockFetcher::with_delay(Duration::from_millis(20)).failing_on(url_of(1));
        let loader = loader(fetcher, 6);
        let (pid, t) = (id(), tile(1));

        let results = join_all((0..10).map(|_| loader.load_tile(&pid, &t, Priority::VISIBLE))).await;

        assert_eq!(loader.fetcher().call_count(&url_of(1)), 1);
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(LoadError::Http { status: 500, .. }))));
    }

    #[tokio::test]
    async fn test_partial_failure_returns_successes() {
        let fetcher = MockFetcher::default().failing_on(url_of(2));
        let loader = loader(fetcher, 6);
        let tiles: Vec<_> = (0..5).map(tile).collect();

        let images = loader.load_tiles(&id(), &tiles, Priority::VISIBLE).await;

        assert_eq!(images.len(), 4);
        assert!(!images.contains_key(&TileCoord::new(2, 0)));
        assert_eq!(loader.stats().cached, 4);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let fetcher = MockFetcher::default().failing_on(url_of(0));
        let loader = loader(fetcher, 2);

        assert!(loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await.is_err());
        assert!(loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await.is_err());
        assert_eq!(loader.fetcher().call_count(&url_of(0)), 2);
        assert!(loader.cached(&url_of(0)).is_none());
    }

    #[tokio::test]
    async fn test_cached_tile_is_not_refetched() {
        let loader = loader(MockFetcher::default(), 2);

        loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await.unwrap();
        loader.load_tile(&id(), &tile(0), Priority::PREFETCH).await.unwrap();

        assert_eq!(loader.fetcher().call_count(&url_of(0)), 1);
    }

    #[tokio::test]
    async fn test_clear_cache_forces_refetch() {
        let loader = loader(MockFetcher::default(), 2);

        loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await.unwrap();
        loader.clear_cache();
        assert_eq!(loader.stats().cached, 0);

        loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await.unwrap();
        assert_eq!(loader.fetcher().call_count(&url_of(0)), 2);
    }

    #[tokio::test]
    async fn test_queue_serviced_by_priority_then_fifo() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = loader(MockFetcher::gated(gate.clone()), 1);

        // Occupy the only slot
        let blocker = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_tile(&id(), &tile(0), Priority::PREFETCH).await })
        };
        wait_until(|| loader.stats().running == 1).await;

        let order = [
            (1, Priority::PREFETCH),
            (2, Priority::VISIBLE),
            (3, Priority::PREFETCH),
            (4, Priority::VISIBLE),
        ];
        let mut handles = Vec::new();
        for (n, (i, priority)) in order.into_iter().enumerate() {
            let l = loader.clone();
            handles.push(tokio::spawn(async move { l.load_tile(&id(), &tile(i), priority).await }));
            wait_until(|| loader.stats().queued == n + 1).await;
        }

        gate.add_permits(16);
        blocker.await.unwrap().unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            loader.fetcher().calls(),
            vec![url_of(0), url_of(2), url_of(4), url_of(1), url_of(3)]
        );
    }

    #[tokio::test]
    async fn test_reprioritized_request_jumps_queue() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = loader(MockFetcher::gated(gate.clone()), 1);

        let blocker = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await })
        };
        wait_until(|| loader.stats().running == 1).await;

        let mut handles = Vec::new();
        for (n, i) in [1u32, 2].into_iter().enumerate() {
            let l = loader.clone();
            handles.push(tokio::spawn(async move {
                l.load_tile(&id(), &tile(i), Priority::PREFETCH).await
            }));
            wait_until(|| loader.stats().queued == n + 1).await;
        }

        // Tile 2 becomes visible while still queued
        let upgraded = {
            let l = loader.clone();
            tokio::spawn(async move { l.load_tile(&id(), &tile(2), Priority::VISIBLE).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.add_permits(16);
        blocker.await.unwrap().unwrap();
        upgraded.await.unwrap().unwrap();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(
            loader.fetcher().calls(),
            vec![url_of(0), url_of(2), url_of(1)]
        );
    }

    #[tokio::test]
    async fn test_stale_epoch_is_skipped() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = loader(MockFetcher::gated(gate.clone()), 1);

        let blocker = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await })
        };
        wait_until(|| loader.stats().running == 1).await;

        let stale = {
            let l = loader.clone();
            tokio::spawn(async move { l.load_tile(&id(), &tile(1), Priority::PREFETCH).await })
        };
        wait_until(|| loader.stats().queued == 1).await;

        assert_eq!(loader.advance_epoch(), 1);
        gate.add_permits(16);

        blocker.await.unwrap().unwrap();
        assert!(matches!(stale.await.unwrap(), Err(LoadError::Superseded)));
        assert_eq!(loader.fetcher().call_count(&url_of(1)), 0);
        assert_eq!(loader.stats().pending, 0);
    }

    #[tokio::test]
    async fn test_rerequest_refreshes_epoch() {
        let gate = Arc::new(Semaphore::new(0));
        let loader = loader(MockFetcher::gated(gate.clone()), 1);

        let blocker = {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_tile(&id(), &tile(0), Priority::VISIBLE).await })
        };
        wait_until(|| loader.stats().running == 1).await;

        let old = {
            let l = loader.clone();
            tokio::spawn(async move { l.load_tile(&id(), &tile(1), Priority::PREFETCH).await })
        };
        wait_until(|| loader.stats().queued == 1).await;

        loader.advance_epoch();
        let renewed = {
            let l = loader.clone();
            tokio::spawn(async move { l.load_tile(&id(), &tile(1), Priority::PREFETCH).await })
        };
        // Wait until the renewed request has attached
        tokio::time::sleep(Duration::from_millis(20)).await;

        gate.add_permits(16);
        blocker.await.unwrap().unwrap();

        // Both callers share the refreshed load
        assert!(old.await.unwrap().is_ok());
        assert!(renewed.await.unwrap().is_ok());
        assert_eq!(loader.fetcher().call_count(&url_of(1)), 1);
    }

    #[tokio::test]
    async fn test_load_tiles_keys_by_coordinate() {
        let loader = loader(MockFetcher::default(), 4);
        let tiles = vec![
            TileRef::new(0, 0, ContentHash::of(b"a")),
            TileRef::new(1, 0, ContentHash::of(b"b")),
            TileRef::new(0, 1, ContentHash::of(b"a")),
        ];

        let images = loader.load_tiles(&id(), &tiles, Priority::VISIBLE).await;

        assert_eq!(images.len(), 3);
        // Two coordinates share one blob, fetched once
        assert_eq!(loader.fetcher().calls().len(), 2);
        assert_eq!(
            images[&TileCoord::new(0, 0)].bytes(),
            images[&TileCoord::new(0, 1)].bytes()
        );
    }
}
