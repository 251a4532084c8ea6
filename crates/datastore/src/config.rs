use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tuning of index maintenance and staleness checks.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// The in-progress update window, in milliseconds.
    ///
    /// An entry modified no more than this long before a query started
    /// is re-checked against the query's predicate.
    /// `i64::MIN` disables re-checking, `i64::MAX` re-checks every entry.
    pub in_progress_update_window_ms: i64,
    /// The number of lock shards of each index's mapping table.
    /// Rounded up to a power of two.
    pub mapping_shards: usize,
}

impl IndexConfig {
    pub const DEFAULT_UPDATE_WINDOW_MS: i64 = 60_000;

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn with_update_window_ms(self, in_progress_update_window_ms: i64) -> Self {
        Self {
            in_progress_update_window_ms,
            ..self
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            in_progress_update_window_ms: Self::DEFAULT_UPDATE_WINDOW_MS,
            mapping_shards: 16,
        }
    }
}
