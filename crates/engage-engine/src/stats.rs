//! Flush counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters updated by the flush path.
#[derive(Debug, Default)]
pub(crate) struct FlushStats {
    pub(crate) armed: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) aborted: AtomicU64,
    pub(crate) retries: AtomicU64,
    pub(crate) rows_written: AtomicU64,
    pub(crate) rows_removed: AtomicU64,
    pub(crate) requeued: AtomicU64,
}

impl FlushStats {
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> FlushStatsSnapshot {
        FlushStatsSnapshot {
            armed: self.armed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            rows_written: self.rows_written.load(Ordering::Relaxed),
            rows_removed: self.rows_removed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the flush counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushStatsSnapshot {
    /// Deferred flushes armed (timers started).
    pub armed: u64,
    /// Flush runs finished, successful or not.
    pub completed: u64,
    /// Flush runs that exhausted their durable write retries.
    pub failed: u64,
    /// Flush runs that could not take the pending hash (fast store unavailable).
    pub aborted: u64,
    /// Durable write retries.
    pub retries: u64,
    /// Interaction rows upserted.
    pub rows_written: u64,
    /// Interaction rows deleted.
    pub rows_removed: u64,
    /// Entries pushed back to the pending hash after a failed flush. Entries
    /// superseded by a newer toggle are not counted.
    pub requeued: u64,
}
