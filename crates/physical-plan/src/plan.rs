use core::ops::{Bound, RangeBounds};
use regiondb_datastore::index::Index;
use regiondb_expr::{CanonicalDefs, PathExpr, Value};
use std::fmt;
use std::sync::Arc;

/// The mapping slot of a query iterator that has no counterpart in the index.
///
/// Index iterator positions are 1-based, so `0` never names one.
pub const UNMAPPED: usize = 0;

/// The kind of lookup a query needs from an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Lookup of single keys.
    Point,
    /// Scan of ordered key ranges.
    Range,
}

/// An index able to serve a query, and how the query's iterators correspond to the index's.
#[derive(Clone)]
pub struct IndexData {
    pub index: Arc<Index>,
    /// `0` for a structural match.
    /// Negative when the index enumerates collections the query does not,
    /// positive when the query has iterators the index does not track.
    /// The magnitude is the number of such iterators.
    pub match_level: i32,
    /// For each query iterator, the 1-based position of the index iterator it corresponds to,
    /// or [`UNMAPPED`].
    pub mapping: Vec<usize>,
}

impl IndexData {
    /// Returns whether the query's definitions are exactly the index's.
    pub fn is_exact(&self) -> bool {
        self.match_level == 0
    }

    /// The 1-based positions of the query iterators resolved by direct iteration
    /// rather than through the index.
    pub fn unmapped_iterators(&self) -> impl Iterator<Item = usize> + '_ {
        self.mapping
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == UNMAPPED)
            .map(|(i, _)| i + 1)
    }

    /// Sort key of a match, smaller is better.
    /// Structural matches first, then matches with extra query iterators,
    /// then matches with extra index iterators, each by how many iterators are left over.
    pub(crate) fn rank(&self) -> (u8, u32) {
        match self.match_level {
            0 => (0, 0),
            l if l > 0 => (1, l.unsigned_abs()),
            l => (2, l.unsigned_abs()),
        }
    }
}

impl PartialEq for IndexData {
    fn eq(&self, other: &Self) -> bool {
        self.index.id() == other.index.id() && self.match_level == other.match_level && self.mapping == other.mapping
    }
}

impl Eq for IndexData {}

impl fmt::Debug for IndexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexData")
            .field("index", &self.index.name())
            .field("match_level", &self.match_level)
            .field("mapping", &self.mapping)
            .finish()
    }
}

/// An index [S]earch [arg]ument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sarg {
    Eq(Value),
    Range(Bound<Value>, Bound<Value>),
    /// Not equal to any of the values.
    NotEq(Vec<Value>),
}

impl Sarg {
    /// The kind of index lookup needed to evaluate this argument.
    pub fn access(&self) -> Access {
        match self {
            Self::Eq(_) => Access::Point,
            Self::Range(..) | Self::NotEq(_) => Access::Range,
        }
    }

    /// Returns whether `value` satisfies this argument.
    ///
    /// `Undefined` and `Null` never satisfy a comparison other than equality.
    pub fn eval(&self, value: &Value) -> bool {
        match self {
            Self::Eq(v) => v == value,
            _ if value.is_absent() => false,
            Self::Range(lo, hi) => (lo.as_ref(), hi.as_ref()).contains(value),
            Self::NotEq(values) => !values.contains(value),
        }
    }

    /// The key ranges an ordered index is scanned over.
    ///
    /// The ranges are disjoint and exclude `Undefined` and `Null` keys.
    pub fn ranges(&self) -> Vec<(Bound<Value>, Bound<Value>)> {
        let above_absent = Bound::Excluded(Value::Null);
        match self {
            Self::Eq(v) => vec![(Bound::Included(v.clone()), Bound::Included(v.clone()))],
            Self::Range(lo, hi) => {
                let lo = match lo {
                    Bound::Included(v) | Bound::Excluded(v) if v.is_absent() => above_absent,
                    Bound::Unbounded => above_absent,
                    lo => lo.clone(),
                };
                vec![(lo, hi.clone())]
            }
            Self::NotEq(values) => {
                let mut values: Vec<_> = values.iter().filter(|v| !v.is_absent()).cloned().collect();
                values.sort_unstable();
                values.dedup();
                let mut ranges = Vec::with_capacity(values.len() + 1);
                let mut lo = above_absent;
                for v in values {
                    ranges.push((lo, Bound::Excluded(v.clone())));
                    lo = Bound::Excluded(v);
                }
                ranges.push((lo, Bound::Unbounded));
                ranges
            }
        }
    }
}

impl fmt::Display for Sarg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eq(v) => write!(f, "= {v}"),
            Self::Range(lo, hi) => {
                match lo {
                    Bound::Included(v) => write!(f, "[{v}")?,
                    Bound::Excluded(v) => write!(f, "({v}")?,
                    Bound::Unbounded => f.write_str("(-inf")?,
                }
                f.write_str(", ")?;
                match hi {
                    Bound::Included(v) => write!(f, "{v}]"),
                    Bound::Excluded(v) => write!(f, "{v})"),
                    Bound::Unbounded => f.write_str("+inf)"),
                }
            }
            Self::NotEq(values) => {
                f.write_str("not in (")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// `select * from <defs> where <target> <sarg>`,
/// returning the region entries for which some binding of the iterators satisfies the predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    /// The region the entries are returned from.
    pub region: Box<str>,
    pub defs: CanonicalDefs,
    pub target: PathExpr,
    pub sarg: Sarg,
}

impl Select {
    pub fn new(defs: CanonicalDefs, target: PathExpr, sarg: Sarg) -> Self {
        Self {
            region: defs.region_path().into(),
            defs,
            target,
            sarg,
        }
    }
}

/// Fetch candidate entries from an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IxScan {
    pub index: IndexData,
    pub arg: Sarg,
}

impl IxScan {
    /// Returns whether every candidate must be checked against the predicate,
    /// regardless of when it was last modified.
    ///
    /// This is the case when the query has iterators the index does not track.
    pub fn always_verify(&self) -> bool {
        self.index.match_level > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhysicalPlan {
    /// Evaluate the predicate for every entry of the region.
    TableScan(Box<str>),
    /// Verify the entries an index returns.
    IxScan(IxScan),
}

/// A compiled [`Select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectPlan {
    pub select: Select,
    pub plan: PhysicalPlan,
}

impl SelectPlan {
    /// The index the plan reads, if any.
    pub fn index(&self) -> Option<&Arc<Index>> {
        match &self.plan {
            PhysicalPlan::IxScan(scan) => Some(&scan.index.index),
            PhysicalPlan::TableScan(_) => None,
        }
    }
}
