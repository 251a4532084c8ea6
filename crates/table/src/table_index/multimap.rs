use super::same_key_entry::{SameKeyEntry, SameKeyEntryIter, same_key_iter};
use super::{Index, RangedIndex};
use core::ops::{Bound, RangeBounds};
use regiondb_primitives::EntryId;
use std::collections::btree_map::{BTreeMap, Range};

/// A multi map that relates a `K` to a *set* of `EntryId`s,
/// with keys kept in order.
#[derive(Debug, PartialEq, Eq)]
pub struct MultiMap<K> {
    /// The map is backed by a `BTreeMap` for relating keys to entries.
    map: BTreeMap<K, SameKeyEntry>,
    /// The memoized number of relations indexed in `self.map`.
    num_rows: usize,
}

impl<K> Default for MultiMap<K> {
    fn default() -> Self {
        Self {
            map: <_>::default(),
            num_rows: <_>::default(),
        }
    }
}

impl<K: Ord> Index for MultiMap<K> {
    type Key = K;

    fn insert(&mut self, key: Self::Key, entry: EntryId) -> bool {
        let added = self.map.entry(key).or_default().push(entry);
        self.num_rows += added as usize;
        added
    }

    fn delete(&mut self, key: &K, entry: EntryId) -> bool {
        let Some(set) = self.map.get_mut(key) else {
            return false;
        };

        let (deleted, is_empty) = set.delete(entry);

        if is_empty {
            self.map.remove(key);
        }

        if deleted {
            self.num_rows -= 1;
        }

        deleted
    }

    type PointIter<'a>
        = SameKeyEntryIter<'a>
    where
        Self: 'a;

    fn seek_point(&self, key: &Self::Key) -> Self::PointIter<'_> {
        same_key_iter(self.map.get(key))
    }

    fn num_keys(&self) -> usize {
        self.map.len()
    }

    fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Deletes all entries from the multimap, leaving it empty.
    /// This will not deallocate the outer map.
    fn clear(&mut self) {
        self.map.clear();
        self.num_rows = 0;
    }
}

impl<K: Ord> RangedIndex for MultiMap<K> {
    type RangeIter<'a>
        = MultiMapRangeIter<'a, K>
    where
        Self: 'a;

    /// Returns an iterator over the multimap that yields all the entries
    /// of the `K`s that fall within the specified `range`.
    ///
    /// A range that ends before it starts yields nothing.
    fn seek_range(&self, range: &impl RangeBounds<Self::Key>) -> Self::RangeIter<'_> {
        let bounds = (range.start_bound(), range.end_bound());
        // `BTreeMap::range` panics on such ranges.
        let outer = if is_empty_range(bounds) {
            Range::default()
        } else {
            self.map.range(bounds)
        };
        MultiMapRangeIter {
            outer,
            inner: SameKeyEntry::empty_iter(),
        }
    }
}

/// Returns whether no key can fall within `(start, end)`.
fn is_empty_range<K: Ord>((start, end): (Bound<&K>, Bound<&K>)) -> bool {
    match (start, end) {
        (Bound::Included(s), Bound::Included(e)) => s > e,
        (Bound::Included(s) | Bound::Excluded(s), Bound::Included(e) | Bound::Excluded(e)) => s >= e,
        _ => false,
    }
}

/// An iterator over entries in a [`MultiMap`] where the keys are in a certain range.
#[derive(Clone)]
pub struct MultiMapRangeIter<'a, K> {
    /// The outer iterator seeking for matching keys in the range.
    outer: Range<'a, K, SameKeyEntry>,
    /// The inner iterator for the entry set for a found key.
    inner: SameKeyEntryIter<'a>,
}

impl<K> Iterator for MultiMapRangeIter<'_, K> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // While the inner iterator has elements, yield them.
            if let Some(val) = self.inner.next() {
                return Some(val);
            }
            // Advance and get a new inner, if possible, or quit.
            let inner = self.outer.next().map(|(_, i)| i)?;
            self.inner = inner.iter();
        }
    }
}
