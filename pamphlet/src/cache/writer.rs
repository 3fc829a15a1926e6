//! Background edge cache writer.
//!
//! Cache repopulation after a durable-store hit must never add latency to
//! the response path. Request handlers hand the body to a [`CacheWriter`]
//! and return immediately; a detached task drains the queue and performs the
//! writes.
//!
//! ```text
//! handler ──schedule()──► mpsc queue ──► writer task ──► Cache::set()
//!    │                                        │
//!    └── returns response                     └── failures: warn! + counter
//! ```
//!
//! When the queue is full the write is dropped, not awaited. A dropped write
//! only costs a later cache miss.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::key::CacheKey;
use super::traits::Cache;

/// Default capacity of the write queue.
pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;

enum WriteJob {
    Put { key: CacheKey, body: Bytes },
    Flush(oneshot::Sender<()>),
}

/// Counters for background writes.
#[derive(Debug, Default)]
pub struct WriterStats {
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl WriterStats {
    /// Writes that reached the cache.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Writes the cache rejected.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Writes discarded because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Handle for scheduling fire-and-forget cache writes.
///
/// Cheap to clone; every clone feeds the same writer task.
#[derive(Clone)]
pub struct CacheWriter {
    tx: mpsc::Sender<WriteJob>,
    stats: Arc<WriterStats>,
}

impl CacheWriter {
    /// Spawn the writer task on the current runtime.
    ///
    /// The task runs until `shutdown` is cancelled, then drains whatever is
    /// already queued and exits.
    pub fn spawn(
        cache: Arc<dyn Cache>,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let stats = Arc::new(WriterStats::default());
        let handle = tokio::spawn(run_writer(cache, rx, Arc::clone(&stats), shutdown));
        (Self { tx, stats }, handle)
    }

    /// Queue a write without waiting for it.
    pub fn schedule(&self, key: CacheKey, body: Bytes) {
        match self.tx.try_send(WriteJob::Put { key, body }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(WriteJob::Put { key, .. })) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, "Cache write queue full, dropping write");
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Cache writer stopped, dropping write");
            }
        }
    }

    /// Wait until every write queued before this call has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(WriteJob::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Write counters.
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }
}

async fn run_writer(
    cache: Arc<dyn Cache>,
    mut rx: mpsc::Receiver<WriteJob>,
    stats: Arc<WriterStats>,
    shutdown: CancellationToken,
) {
    debug!("Cache writer started");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            job = rx.recv() => match job {
                Some(job) => apply(&*cache, job, &stats).await,
                None => break,
            },
        }
    }

    rx.close();
    let mut drained = 0usize;
    while let Some(job) = rx.recv().await {
        apply(&*cache, job, &stats).await;
        drained += 1;
    }

    info!(
        drained,
        written = stats.written(),
        failed = stats.failed(),
        "Cache writer stopped"
    );
}

async fn apply(cache: &dyn Cache, job: WriteJob, stats: &WriterStats) {
    match job {
        WriteJob::Put { key, body } => {
            let rendered = key.render();
            match cache.set(&rendered, body).await {
                Ok(()) => {
                    stats.written.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %rendered, "Edge cache populated");
                }
                Err(e) => {
                    stats.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(key = %rendered, error = %e, "Background cache write failed");
                }
            }
        }
        WriteJob::Flush(done) => {
            let _ = done.send(());
        }
    }
}
