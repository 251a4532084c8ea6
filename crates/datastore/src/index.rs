//! An index over a region and the maintenance of its mapping table.

use crate::error::IndexError;
use core::ops::RangeBounds;
use regiondb_expr::{CanonicalDefs, PathExpr, Value, eval_keys};
use regiondb_primitives::{EntryId, IndexId, IndexKind, RemovalKind};
use regiondb_table::{EntryMapping, EntryRef, IndexStatistics, MappingTable, Region, StatisticsSnapshot, Upsert};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use std::vec;

/// A secondary index over the entries of one region.
///
/// The definitions and indexed expression never change after creation.
/// Only the mapping table and the statistics do.
pub struct Index {
    id: IndexId,
    name: Box<str>,
    kind: IndexKind,
    region_path: Box<str>,
    defs: CanonicalDefs,
    indexed_expr: PathExpr,
    table: MappingTable,
    stats: IndexStatistics,
    /// Incremented when a scan of the region into `table` starts and when it completes,
    /// so it is odd while `table` is incomplete.
    population: AtomicU64,
}

impl Index {
    pub(crate) fn new(
        id: IndexId,
        name: &str,
        kind: IndexKind,
        indexed_expr: PathExpr,
        defs: CanonicalDefs,
        shards: usize,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            region_path: defs.region_path().into(),
            defs,
            indexed_expr,
            table: MappingTable::new(kind, shards),
            stats: IndexStatistics::default(),
            population: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> IndexId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn region_path(&self) -> &str {
        &self.region_path
    }

    /// The iteration definitions the index is defined over, in canonical form.
    pub fn defs(&self) -> &CanonicalDefs {
        &self.defs
    }

    /// The path evaluated per entry to produce its keys.
    pub fn indexed_expr(&self) -> &PathExpr {
        &self.indexed_expr
    }

    /// Returns whether the mapping table holds every entry of the region.
    /// Queries should not use an index before that.
    pub fn is_populated(&self) -> bool {
        self.population().is_some()
    }

    /// Returns a token naming the current population of the mapping table,
    /// or `None` while the table is being filled or once the index was dropped.
    ///
    /// A scan saw a complete table if the token is the same before and after it.
    pub fn population(&self) -> Option<u64> {
        let population = self.population.load(Ordering::Acquire);
        (population % 2 == 0 && !self.table.is_closed()).then_some(population)
    }

    /// Adds the mappings of an entry that did not exist before.
    pub fn add_mapping(&self, entry: EntryRef<'_>) {
        self.map_entry(entry);
    }

    /// Replaces the mappings of an entry whose value changed.
    ///
    /// The keys the entry had before are the ones recorded for it,
    /// so they need not be supplied.
    /// An update that does not change the keys only refreshes the last-modified marker.
    pub fn update_mapping(&self, entry: EntryRef<'_>) {
        self.map_entry(entry);
    }

    fn map_entry(&self, entry: EntryRef<'_>) {
        let start = Instant::now();
        let Some(value) = entry.value else {
            // An invalidated entry matches nothing.
            self.remove_mapping(entry.id, RemovalKind::Invalidate);
            return;
        };
        let keys = match eval_keys(&self.defs, &self.indexed_expr, entry.key, value) {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!(
                    "index `{}`: cannot evaluate `{}` for entry {} (key {}), leaving it unindexed: {err}",
                    self.name,
                    self.indexed_expr,
                    entry.id,
                    entry.key,
                );
                self.stats.inc_evaluation_failures();
                self.remove_mapping(entry.id, RemovalKind::Other);
                return;
            }
        };
        match self.table.upsert(entry.id, keys, entry.last_modified) {
            Upsert::Closed => log::trace!("index `{}` was dropped, not mapping entry {}", self.name, entry.id),
            Upsert::Inserted | Upsert::Updated { .. } => self.stats.inc_updates(start.elapsed()),
        }
    }

    /// Removes the mappings of an entry.
    ///
    /// Removing an entry that is not mapped,
    /// e.g., because another thread already processed its destruction,
    /// does nothing.
    pub fn remove_mapping(&self, entry: EntryId, kind: RemovalKind) {
        let start = Instant::now();
        match self.table.remove(entry) {
            None => log::trace!("index `{}`: entry {entry} already unmapped", self.name),
            Some(_) if kind.counts_as_update() => self.stats.inc_updates(start.elapsed()),
            Some(_) => {}
        }
    }

    /// Returns what the index records for `entry`.
    pub fn mapping(&self, entry: EntryId) -> Option<EntryMapping> {
        self.table.get(entry)
    }

    /// Returns the entries having the key `key`.
    pub fn scan_point(&self, key: &Value) -> vec::IntoIter<EntryId> {
        self.table.seek_point(key).into_iter()
    }

    /// Returns the entries having a key within `range`.
    pub fn scan_range(&self, range: &impl RangeBounds<Value>) -> Result<vec::IntoIter<EntryId>, IndexError> {
        self.table
            .seek_range(range)
            .map(Vec::into_iter)
            .map_err(|_| IndexError::CannotSeekRange(self.name.to_string()))
    }

    /// Records that one query execution was served by this index.
    pub fn record_use(&self, elapsed: Duration) {
        self.stats.inc_uses();
        self.stats.add_use_time(elapsed);
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.stats.snapshot(self.table.num_keys(), self.table.num_values())
    }

    /// Maps every live entry of `region`.
    ///
    /// Callers serialize populations of the same index.
    pub(crate) fn populate(&self, region: &Region) {
        region.for_each_live(|entry| self.add_mapping(entry));
        self.population.fetch_add(1, Ordering::AcqRel);
    }

    /// Discards every mapping and maps `region` again.
    pub(crate) fn rebuild(&self, region: &Region) {
        self.population.fetch_add(1, Ordering::AcqRel);
        self.table.clear();
        self.stats.reset_updates();
        self.populate(region);
    }

    /// Discards every mapping, including those of writers still holding the index.
    /// The index is never populated again.
    pub(crate) fn clear(&self) {
        self.table.close();
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("defs", &self.defs.to_string())
            .field("indexed_expr", &self.indexed_expr.to_string())
            .field("populated", &self.is_populated())
            .finish_non_exhaustive()
    }
}
