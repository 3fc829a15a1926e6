//! Priority queue for tile loads.
//!
//! Loads are ordered by priority (higher values first), then by enqueue
//! order (FIFO within the same priority level). Visible tiles therefore
//! overtake prefetch work, and tiles of equal priority are fetched in the
//! order they were requested.
//!
//! The queue holds URLs only. Raising the priority of a queued URL pushes a
//! second entry; the loader discards entries that no longer match its
//! pending state when they surface.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::viewport::Priority;

/// A URL waiting to be fetched.
#[derive(Debug, Clone)]
pub(crate) struct QueuedLoad {
    pub url: String,
    pub priority: Priority,
    sequence: u64,
}

// Ordering for BinaryHeap: higher priority first, then lower sequence (older) first
impl PartialEq for QueuedLoad {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for QueuedLoad {}

impl PartialOrd for QueuedLoad {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedLoad {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.priority.cmp(&other.priority) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            other_ordering => other_ordering,
        }
    }
}

/// Max-heap of queued loads. Not thread-safe; the loader wraps it in its
/// state mutex.
#[derive(Debug, Default)]
pub(crate) struct LoadQueue {
    heap: BinaryHeap<QueuedLoad>,
    next_sequence: u64,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, url: String, priority: Priority) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedLoad {
            url,
            priority,
            sequence,
        });
    }

    /// Removes and returns the highest-priority load.
    pub fn pop(&mut self) -> Option<QueuedLoad> {
        self.heap.pop()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
