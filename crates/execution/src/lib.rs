//! Executes selects over the regions of a [`Cache`].
//!
//! A select is compiled against the indexes of its region.
//! With an index, candidates are fetched from the index
//! and re-checked against the predicate whenever the [`StalenessArbiter`] says so.
//! Without one, every entry of the region is checked.
//! A plan whose index was rebuilt or dropped while it ran falls back to checking every entry.

use anyhow::{Result, anyhow, bail};
use regiondb_datastore::arbiter::StalenessArbiter;
use regiondb_datastore::cache::Cache;
use regiondb_datastore::catalog::IndexList;
use regiondb_datastore::index::Index;
use regiondb_physical_plan::compile;
use regiondb_physical_plan::plan::{IxScan, PhysicalPlan, Sarg, Select, SelectPlan};
use regiondb_primitives::{EntryId, Millis};
use regiondb_table::{EntrySnapshot, Region};
use std::sync::Arc;
use std::time::Instant;

pub mod predicate;

/// The datastore interface required for building an executor
pub trait Datastore {
    fn region(&self, path: &str) -> Option<Arc<Region>>;
    fn indexes(&self, path: &str) -> IndexList;
    fn arbiter(&self) -> &StalenessArbiter;
    /// The current time, as stamped on entries.
    fn now(&self) -> Millis;

    fn region_or_err(&self, path: &str) -> Result<Arc<Region>> {
        self.region(path)
            .ok_or_else(|| anyhow!("Region `{path}` does not exist"))
    }
}

impl Datastore for Cache {
    fn region(&self, path: &str) -> Option<Arc<Region>> {
        Cache::region(self, path)
    }

    fn indexes(&self, path: &str) -> IndexList {
        self.all_for_region(path)
    }

    fn arbiter(&self) -> &StalenessArbiter {
        Cache::arbiter(self)
    }

    fn now(&self) -> Millis {
        self.clock().now()
    }
}

/// The entries a select returned, and how they were found.
#[derive(Debug, Default)]
pub struct QueryResult {
    /// Distinct entries, ordered by id.
    pub entries: Vec<EntrySnapshot>,
    /// The index the query read, if any.
    pub index: Option<String>,
    /// The number of entries the index returned.
    pub num_candidates: usize,
    /// The number of candidates checked against the predicate.
    pub num_reevaluated: usize,
}

/// Compiles and executes `select`.
pub fn execute(ds: &impl Datastore, select: Select) -> Result<QueryResult> {
    if select.defs.num_regions() != 1 {
        bail!("`{}` iterates more than one region", select.defs);
    }
    let region = ds.region_or_err(&select.region)?;
    let plan = compile(select, &ds.indexes(region.path()));
    execute_plan(ds, &region, &plan)
}

/// Executes a compiled select against `region`.
pub fn execute_plan(ds: &impl Datastore, region: &Region, plan: &SelectPlan) -> Result<QueryResult> {
    let start = ds.now();
    match &plan.plan {
        PhysicalPlan::TableScan(_) => Ok(table_scan(region, &plan.select)),
        PhysicalPlan::IxScan(scan) => index_scan(ds, region, &plan.select, scan, start),
    }
}

fn table_scan(region: &Region, select: &Select) -> QueryResult {
    let mut entries = Vec::new();
    region.for_each_live(|entry| {
        if let Some(value) = entry.value
            && predicate::matches(select, entry.key, value)
        {
            entries.push(entry.to_snapshot());
        }
    });
    QueryResult {
        entries,
        ..<_>::default()
    }
}

fn index_scan(ds: &impl Datastore, region: &Region, select: &Select, scan: &IxScan, start: Millis) -> Result<QueryResult> {
    let index = &scan.index.index;
    let timer = Instant::now();

    let Some(population) = index.population() else {
        return Ok(rescan(region, select, index));
    };
    let mut ids: Vec<EntryId> = match &scan.arg {
        Sarg::Eq(key) => index.scan_point(key).collect(),
        arg => {
            let mut ids = Vec::new();
            for range in arg.ranges() {
                ids.extend(index.scan_range(&range)?);
            }
            ids
        }
    };
    if index.population() != Some(population) {
        return Ok(rescan(region, select, index));
    }
    ids.sort_unstable();
    ids.dedup();

    let mut result = QueryResult {
        index: Some(index.name().to_owned()),
        num_candidates: ids.len(),
        ..<_>::default()
    };
    for id in ids {
        // Destroyed since it was mapped.
        let Some(entry) = region.get_entry(id) else {
            continue;
        };
        let Some(value) = &entry.value else {
            continue;
        };
        if scan.always_verify() || ds.arbiter().needs_recalculation(start, entry.last_modified) {
            result.num_reevaluated += 1;
            if !predicate::matches(select, &entry.key, value) {
                continue;
            }
        }
        result.entries.push(entry);
    }
    index.record_use(timer.elapsed());
    Ok(result)
}

/// Scans the region for a plan whose index no longer holds every entry.
fn rescan(region: &Region, select: &Select, index: &Index) -> QueryResult {
    log::debug!(
        "EXEC SCAN: index {} is being rebuilt or was dropped, scanning {}",
        index.name(),
        region.path()
    );
    table_scan(region, select)
}
