use core::ops::RangeBounds;
use regiondb_primitives::EntryId;

pub trait Index {
    /// The type of keys indexed.
    type Key;

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Inserts the relation `key -> entry` to this map.
    ///
    /// Returns whether the relation is new.
    /// Inserting a relation that is already present changes nothing.
    fn insert(&mut self, key: Self::Key, entry: EntryId) -> bool;

    /// Deletes `key -> entry` from this index.
    ///
    /// Returns whether `key -> entry` was present.
    fn delete(&mut self, key: &Self::Key, entry: EntryId) -> bool;

    /// Clears all the entries and keys from the index,
    /// leaving it empty.
    fn clear(&mut self);

    // =========================================================================
    // Querying
    // =========================================================================

    /// Returns the number of keys indexed.
    ///
    /// This method runs in constant time.
    fn num_keys(&self) -> usize;

    /// Returns the number of `key -> entry` relations indexed.
    ///
    /// When `self.num_keys() == 0` then `self.num_rows() == 0`.
    /// This may be larger than [`Index::num_keys`] as keys are shared.
    ///
    /// This method runs in constant time.
    fn num_rows(&self) -> usize;

    /// Returns whether the index has no key or values.
    ///
    /// The provided implementation uses [`Index::num_keys`].
    fn is_empty(&self) -> bool {
        self.num_keys() == 0
    }

    /// The type of iterator returned by [`Index::seek_point`].
    type PointIter<'a>: Iterator<Item = EntryId>
    where
        Self: 'a;

    /// Seeks `point` in this index,
    /// returning an iterator over all the entries related to it.
    fn seek_point(&self, point: &Self::Key) -> Self::PointIter<'_>;
}

pub trait RangedIndex: Index {
    /// The type of iterator returned by [`RangedIndex::seek_range`].
    type RangeIter<'a>: Iterator<Item = EntryId>
    where
        Self: 'a;

    /// Seeks the `range` in this index,
    /// returning an iterator over all the entries, in key order.
    ///
    /// Prefer [`Index::seek_point`] for point scans
    /// rather than providing a point `range`
    /// as it will be faster.
    fn seek_range(&self, range: &impl RangeBounds<Self::Key>) -> Self::RangeIter<'_>;
}

/// An error indicating that the [`Index`] is not a [`RangedIndex`].
#[derive(Debug, PartialEq)]
pub struct IndexCannotSeekRange;

pub type IndexSeekRangeResult<T> = Result<T, IndexCannotSeekRange>;
