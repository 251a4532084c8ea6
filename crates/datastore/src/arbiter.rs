use crate::config::IndexConfig;
use regiondb_primitives::Millis;

/// Decides whether an index's answer for an entry can be trusted.
///
/// An index lookup implies that a candidate entry matched the predicate
/// when its mapping was last maintained.
/// A writer may have changed the entry while the query was running,
/// so an entry modified within the in-progress update window
/// before the query started must be re-checked against the predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessArbiter {
    window_ms: i64,
}

impl StalenessArbiter {
    pub fn new(window_ms: i64) -> Self {
        Self { window_ms }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.in_progress_update_window_ms)
    }

    pub fn window_ms(&self) -> i64 {
        self.window_ms
    }

    /// Returns whether `query_start - last_modified <= window`.
    ///
    /// The difference is computed without overflow,
    /// so a window of `i64::MIN` never asks for recalculation
    /// and a window of `i64::MAX` always does.
    pub fn needs_recalculation(&self, query_start: Millis, last_modified: Millis) -> bool {
        if self.window_ms == i64::MAX {
            return true;
        }
        query_start.since(last_modified) <= self.window_ms as i128
    }
}

impl Default for StalenessArbiter {
    fn default() -> Self {
        Self::from_config(&IndexConfig::default())
    }
}
