//! This module defines the rules an index must pass to serve a query.
//!
//! These include:
//!
//! * [IsPopulated]
//!     Skip indexes whose initial scan has not completed
//! * [SupportsAccess]
//!     Skip hash indexes for range lookups
//! * [AlignDefs]
//!     Align the query's iteration definitions with the index's
//!
//! An index passing all of them must also index the query's target path,
//! once translated through the alignment. See [match_index].
use regiondb_datastore::index::Index;
use regiondb_expr::{CanonicalDefs, IterDef, PathExpr};
use std::sync::Arc;

use crate::plan::{Access, IndexData, UNMAPPED};

/// What the planner looks for in an index.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    pub defs: &'a CanonicalDefs,
    pub target: &'a PathExpr,
    pub access: Access,
}

pub trait IndexRule {
    type Info;

    fn matches(index: &Index, probe: &Probe<'_>) -> Option<Self::Info>;
}

/// An index is only complete once its initial population has finished.
pub struct IsPopulated;

impl IndexRule for IsPopulated {
    type Info = ();

    fn matches(index: &Index, _: &Probe<'_>) -> Option<Self::Info> {
        index.is_populated().then_some(())
    }
}

/// Range lookups need ordered keys.
pub struct SupportsAccess;

impl IndexRule for SupportsAccess {
    type Info = ();

    fn matches(index: &Index, probe: &Probe<'_>) -> Option<Self::Info> {
        match probe.access {
            Access::Point => Some(()),
            Access::Range => index.kind().is_ordered().then_some(()),
        }
    }
}

/// The result of aligning a query's definitions with an index's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub match_level: i32,
    pub mapping: Vec<usize>,
}

impl Alignment {
    /// Rewrites a path over a query iterator into a path over the corresponding index iterator.
    /// Returns `None` if that query iterator has no counterpart.
    pub fn translate(&self, path: &PathExpr) -> Option<PathExpr> {
        match path.iter.checked_sub(1).and_then(|i| self.mapping.get(i)) {
            None | Some(&UNMAPPED) => None,
            Some(&iter) => Some(path.with_iter(iter)),
        }
    }
}

/// Structural alignment of iteration definitions.
///
/// Query definitions are visited in order.
/// A nested definition is first rewritten in terms of the index iterators
/// its parent corresponds to.
/// It then corresponds to the first structurally equal index definition
/// after the last one matched so far.
/// A definition whose parent has no counterpart has none either.
///
/// The index qualifies if the leading query definition has a counterpart
/// and either every query definition or every index definition was matched.
pub struct AlignDefs;

impl AlignDefs {
    pub fn align(index: &[IterDef], query: &[IterDef]) -> Option<Alignment> {
        let mut mapping = vec![UNMAPPED; query.len()];
        let mut next = 0;
        for (pos, def) in query.iter().enumerate() {
            let translated = match def.depends_on() {
                None => def.clone(),
                Some(iter) => match mapping.get(iter.wrapping_sub(1)) {
                    None | Some(&UNMAPPED) => continue,
                    Some(&parent) => def.with_iter(parent),
                },
            };
            if let Some(found) = index[next..].iter().position(|d| *d == translated) {
                next += found + 1;
                mapping[pos] = next;
            }
        }

        if mapping.first().is_none_or(|m| *m == UNMAPPED) {
            return None;
        }
        let matched = mapping.iter().filter(|m| **m != UNMAPPED).count();
        let extra_query = (query.len() - matched) as i32;
        let extra_index = (index.len() - matched) as i32;
        let match_level = match (extra_query, extra_index) {
            (0, extra_index) => -extra_index,
            (extra_query, 0) => extra_query,
            // Both sides enumerate something the other does not.
            _ => return None,
        };
        Some(Alignment { match_level, mapping })
    }
}

impl IndexRule for AlignDefs {
    type Info = Alignment;

    fn matches(index: &Index, probe: &Probe<'_>) -> Option<Self::Info> {
        Self::align(index.defs(), probe.defs)
    }
}

/// Returns how `index` can serve `probe`, if it can.
pub fn match_index(index: &Arc<Index>, probe: &Probe<'_>) -> Option<IndexData> {
    IsPopulated::matches(index, probe)?;
    SupportsAccess::matches(index, probe)?;
    let alignment = AlignDefs::matches(index, probe)?;
    if alignment.translate(probe.target)? != *index.indexed_expr() {
        return None;
    }
    Some(IndexData {
        index: index.clone(),
        match_level: alignment.match_level,
        mapping: alignment.mapping,
    })
}
