//! Index selection for regiondb queries.
//!
//! [`find_index`] picks the index best able to serve a path over a query's iterators.
//! [`compile`] turns a [`Select`](plan::Select) into a plan that reads through that index,
//! or scans the region if there is none.

use plan::{Access, IndexData, IxScan, PhysicalPlan, Select, SelectPlan};
use regiondb_datastore::index::Index;
use regiondb_expr::{CanonicalDefs, PathExpr};
use rules::{Probe, match_index};
use std::sync::Arc;

pub mod plan;
pub mod rules;

/// Returns the index among `indexes` best able to serve `target` over `defs`,
/// or `None` if the query must scan the region.
///
/// A structural match wins outright.
/// Otherwise a match with extra query iterators beats one with extra index iterators,
/// fewer extra iterators beat more,
/// and ties go to the index earlier in `indexes`.
pub fn find_index(indexes: &[Arc<Index>], defs: &CanonicalDefs, target: &PathExpr, access: Access) -> Option<IndexData> {
    let probe = Probe { defs, target, access };
    let mut best: Option<IndexData> = None;
    for index in indexes {
        let Some(data) = match_index(index, &probe) else {
            continue;
        };
        if data.is_exact() {
            best = Some(data);
            break;
        }
        if best.as_ref().is_none_or(|best| data.rank() < best.rank()) {
            best = Some(data);
        }
    }
    match &best {
        Some(data) => log::debug!(
            "PLAN INDEX: {} for {target} over {defs} with match level: {}, mapping: {:?}",
            data.index.name(),
            data.match_level,
            data.mapping
        ),
        None => log::debug!("PLAN SCAN: no index for {target} over {defs}"),
    }
    best
}

/// Compiles `select` against the indexes of its region.
///
/// An index that enumerates collections the query does not iterate
/// has no keys for entries whose collections are empty,
/// so it cannot serve the query on its own.
pub fn compile(select: Select, indexes: &[Arc<Index>]) -> SelectPlan {
    let plan = match find_index(indexes, &select.defs, &select.target, select.sarg.access()) {
        Some(index) if index.match_level >= 0 => PhysicalPlan::IxScan(IxScan {
            index,
            arg: select.sarg.clone(),
        }),
        Some(index) => {
            log::debug!(
                "PLAN SCAN: index {} covers only entries with elements in {} collection(s) {} does not iterate",
                index.index.name(),
                index.match_level.unsigned_abs(),
                select.defs
            );
            PhysicalPlan::TableScan(select.region.clone())
        }
        None => PhysicalPlan::TableScan(select.region.clone()),
    };
    SelectPlan { select, plan }
}
