//! Storage for regions and their secondary indexes.
//!
//! [`region`] holds the entries of a region and notifies listeners of their lifecycle.
//! [`table_index`] stores keys per index kind,
//! [`mapping`] makes that storage safe to share between writers and readers,
//! and [`stats`] counts how an index is used.

pub mod mapping;
pub mod region;
pub mod stats;
pub mod table_index;

pub use mapping::{EntryMapping, MappingTable, Upsert};
pub use region::{
    Clock, EntryListener, EntryRef, EntrySnapshot, ListenerId, ManualClock, Region, RegionError, SystemClock,
};
pub use stats::{IndexStatistics, StatisticsSnapshot};
