//! Key storage for secondary indexes.
//!
//! Every index kind relates [`Value`] keys to sets of [`EntryId`]s.
//! They differ only in how the keys are stored,
//! which is captured by the closed enum [`TypedIndex`]:
//! ordered kinds use a B-Tree and support range scans,
//! hashed kinds support point scans only.

use core::ops::RangeBounds;
use regiondb_expr::Value;
use regiondb_primitives::{EntryId, IndexKind};

mod hash_index;
mod index;
mod multimap;
mod same_key_entry;

pub use hash_index::HashIndex;
pub use index::{Index, IndexCannotSeekRange, IndexSeekRangeResult, RangedIndex};
pub use multimap::{MultiMap, MultiMapRangeIter};
pub use same_key_entry::SameKeyEntryIter;

type BtreeIndex = MultiMap<Value>;

/// An iterator over entries related to a single key of a [`TypedIndex`].
pub type TypedIndexPointIter<'a> = SameKeyEntryIter<'a>;

/// An iterator over entries related to a range of keys of a [`TypedIndex`].
pub type TypedIndexRangeIter<'a> = MultiMapRangeIter<'a, Value>;

/// An index from [`Value`] keys to [`EntryId`]s,
/// with the key storage strategy picked by the [`IndexKind`].
#[derive(Debug, PartialEq, Eq)]
pub enum TypedIndex {
    Btree(BtreeIndex),
    Hash(HashIndex<Value>),
}

impl TypedIndex {
    /// Returns an empty index storing keys the way `kind` requires.
    pub fn new(kind: IndexKind) -> Self {
        if kind.is_ordered() {
            Self::Btree(<_>::default())
        } else {
            Self::Hash(<_>::default())
        }
    }

    /// Returns whether this index supports [`TypedIndex::seek_range`].
    pub fn is_ranged(&self) -> bool {
        matches!(self, Self::Btree(_))
    }

    /// Inserts `key -> entry`, returning whether the relation is new.
    pub fn insert(&mut self, key: Value, entry: EntryId) -> bool {
        match self {
            Self::Btree(this) => this.insert(key, entry),
            Self::Hash(this) => this.insert(key, entry),
        }
    }

    /// Deletes `key -> entry`, returning whether it was present.
    pub fn delete(&mut self, key: &Value, entry: EntryId) -> bool {
        match self {
            Self::Btree(this) => this.delete(key, entry),
            Self::Hash(this) => this.delete(key, entry),
        }
    }

    pub fn seek_point(&self, key: &Value) -> TypedIndexPointIter<'_> {
        match self {
            Self::Btree(this) => this.seek_point(key),
            Self::Hash(this) => this.seek_point(key),
        }
    }

    /// Seeks the `range` of keys, in key order.
    ///
    /// Fails for hashed indexes.
    pub fn seek_range(&self, range: &impl RangeBounds<Value>) -> IndexSeekRangeResult<TypedIndexRangeIter<'_>> {
        match self {
            Self::Btree(this) => Ok(this.seek_range(range)),
            Self::Hash(_) => Err(IndexCannotSeekRange),
        }
    }

    pub fn num_keys(&self) -> usize {
        match self {
            Self::Btree(this) => this.num_keys(),
            Self::Hash(this) => this.num_keys(),
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            Self::Btree(this) => this.num_rows(),
            Self::Hash(this) => this.num_rows(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Self::Btree(this) => this.clear(),
            Self::Hash(this) => this.clear(),
        }
    }
}
