use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Usage and maintenance counters of one index.
///
/// Counters are updated concurrently by writers and queries
/// and are only ever read through a [`StatisticsSnapshot`].
#[derive(Debug, Default)]
pub struct IndexStatistics {
    total_uses: AtomicU64,
    num_updates: AtomicU64,
    total_update_time: AtomicU64,
    total_use_time: AtomicU64,
    num_evaluation_failures: AtomicU64,
}

fn nanos(d: Duration) -> u64 {
    d.as_nanos().try_into().unwrap_or(u64::MAX)
}

impl IndexStatistics {
    /// Records that a query execution was served by the index.
    pub fn inc_uses(&self) {
        self.total_uses.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the time a query execution spent reading the index.
    pub fn add_use_time(&self, elapsed: Duration) {
        self.total_use_time.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    /// Records one maintenance operation that took `elapsed`.
    pub fn inc_updates(&self, elapsed: Duration) {
        self.num_updates.fetch_add(1, Ordering::Relaxed);
        self.total_update_time.fetch_add(nanos(elapsed), Ordering::Relaxed);
    }

    pub fn inc_evaluation_failures(&self) {
        self.num_evaluation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets the maintenance counters, e.g., when the index is rebuilt.
    /// Usage counters survive.
    pub fn reset_updates(&self) {
        self.num_updates.store(0, Ordering::Relaxed);
        self.total_update_time.store(0, Ordering::Relaxed);
        self.num_evaluation_failures.store(0, Ordering::Relaxed);
    }

    /// Returns a copy of the counters,
    /// completed with the key and value counts of the index's mapping table.
    pub fn snapshot(&self, num_keys: usize, num_values: usize) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_uses: self.total_uses.load(Ordering::Relaxed),
            num_updates: self.num_updates.load(Ordering::Relaxed),
            num_keys: num_keys as u64,
            num_values: num_values as u64,
            total_update_time_ns: self.total_update_time.load(Ordering::Relaxed),
            total_use_time_ns: self.total_use_time.load(Ordering::Relaxed),
            num_evaluation_failures: self.num_evaluation_failures.load(Ordering::Relaxed),
        }
    }
}

/// A read-only copy of an index's statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    /// The number of query executions served by the index.
    pub total_uses: u64,
    /// The number of maintenance operations applied to the index.
    pub num_updates: u64,
    /// The number of distinct keys.
    pub num_keys: u64,
    /// The number of `key -> entry` relations.
    pub num_values: u64,
    pub total_update_time_ns: u64,
    pub total_use_time_ns: u64,
    /// The number of entries left unindexed because their key could not be evaluated.
    pub num_evaluation_failures: u64,
}
