use super::Index;
use super::same_key_entry::{SameKeyEntry, SameKeyEntryIter, same_key_iter};
use ahash::RandomState;
use core::hash::Hash;
use regiondb_primitives::EntryId;
use std::collections::HashMap;

/// A multi map that relates a `K` to a *set* of `EntryId`s,
/// supporting point lookups only.
#[derive(Debug, PartialEq, Eq)]
pub struct HashIndex<K: Eq + Hash> {
    /// The map is backed by a `HashMap` for relating keys to entries.
    map: HashMap<K, SameKeyEntry, RandomState>,
    /// The memoized number of relations indexed in `self.map`.
    num_rows: usize,
}

impl<K: Eq + Hash> Default for HashIndex<K> {
    fn default() -> Self {
        Self {
            map: <_>::default(),
            num_rows: <_>::default(),
        }
    }
}

impl<K: Eq + Hash> Index for HashIndex<K> {
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

        if deleted {
            self.num_rows -= 1;
        }

        if is_empty {
            self.map.remove(key);
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

    /// Deletes all entries from the map, leaving it empty.
    /// This will not deallocate the outer map.
    fn clear(&mut self) {
        self.map.clear();
        self.num_rows = 0;
    }
}
