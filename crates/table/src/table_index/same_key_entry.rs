use ahash::RandomState;
use core::{mem, slice};
use regiondb_primitives::EntryId;
use smallvec::SmallVec;
use std::collections::{HashSet, hash_set};

type Small = SmallVec<[EntryId; 2]>;
type Large = HashSet<EntryId, RandomState>;

/// A supporting type for multimap implementations
/// that handles all the entries for the same key,
/// leaving the multimap to only have to care about the keys.
///
/// For performance reasons,
/// this is an enum
/// that deals with a smaller number of entries in the first variant
/// and with a larger number in the second variant.
#[derive(Debug, PartialEq, Eq)]
pub(super) enum SameKeyEntry {
    /// A small number of entries.
    ///
    /// No ordering is kept between entries.
    /// Insertions are amortized `O(1)` whereas deletions are `O(|entries|)`.
    ///
    /// This also represents the "no entries" case,
    /// although the multimap deletes the key in that case.
    ///
    /// Invariant: never contains duplicates.
    Small(Small),

    /// A large number of entries.
    ///
    /// Iteration order is not deterministic.
    Large(Large),
}

impl Default for SameKeyEntry {
    fn default() -> Self {
        Self::Small(<_>::default())
    }
}

impl SameKeyEntry {
    /// The number of elements
    /// beyond which the strategy is changed from small to large storage.
    const LARGE_AFTER_LEN: usize = 4096 / size_of::<EntryId>();

    /// Pushes `entry` under the key.
    ///
    /// Returns whether `entry` was newly added.
    /// Small sets check for residency with a linear scan.
    pub(super) fn push(&mut self, entry: EntryId) -> bool {
        match self {
            Self::Small(list) if list.contains(&entry) => false,
            Self::Small(list) if list.len() <= Self::LARGE_AFTER_LEN => {
                list.push(entry);
                true
            }
            Self::Small(list) => {
                // Reconstruct into a hash set.
                let mut set = Large::with_capacity_and_hasher(list.len() + 1, RandomState::new());
                set.extend(mem::take(list));
                set.insert(entry);
                *self = Self::Large(set);
                true
            }
            Self::Large(set) => set.insert(entry),
        }
    }

    /// Deletes `entry` under the key.
    ///
    /// Returns `(was_deleted, is_empty)`.
    pub(super) fn delete(&mut self, entry: EntryId) -> (bool, bool) {
        match self {
            Self::Small(list) => {
                // The `list` is not sorted, so we have to do a linear scan first.
                if let Some(idx) = list.iter().position(|v| *v == entry) {
                    list.swap_remove(idx);
                    (true, list.is_empty())
                } else {
                    (false, list.is_empty())
                }
            }
            Self::Large(set) => {
                let removed = set.remove(&entry);
                (removed, set.is_empty())
            }
        }
    }

    /// Returns the number of entries under the key.
    pub(super) fn len(&self) -> usize {
        match self {
            Self::Small(list) => list.len(),
            Self::Large(set) => set.len(),
        }
    }

    /// Returns an iterator over all the entries for this key.
    pub(super) fn iter(&self) -> SameKeyEntryIter<'_> {
        match self {
            Self::Small(list) => SameKeyEntryIter::Small(list.iter()),
            Self::Large(set) => SameKeyEntryIter::Large(Box::new(set.iter())),
        }
    }

    /// Returns an iterator over no entries.
    pub(super) fn empty_iter<'a>() -> SameKeyEntryIter<'a> {
        SameKeyEntryIter::Small(const { &[] }.iter())
    }
}

/// Returns an iterator for a key's entries `ske`.
/// This efficiently handles the case where there's no key (`None`).
pub(super) fn same_key_iter(ske: Option<&SameKeyEntry>) -> SameKeyEntryIter<'_> {
    match ske {
        None => SameKeyEntry::empty_iter(),
        Some(ske) => ske.iter(),
    }
}

/// An iterator over entries in a [`SameKeyEntry`].
#[derive(Clone)]
pub enum SameKeyEntryIter<'a> {
    Small(slice::Iter<'a, EntryId>),
    /// This variant doesn't occur so much
    /// and we'd like to reduce the footprint of `SameKeyEntryIter`.
    Large(Box<hash_set::Iter<'a, EntryId>>),
}

impl Iterator for SameKeyEntryIter<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Small(list) => list.next(),
            Self::Large(set) => set.next(),
        }
        .copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_into_a_set_and_back_to_empty() {
        let mut ske = SameKeyEntry::default();
        let n = SameKeyEntry::LARGE_AFTER_LEN as u32 + 10;
        for slot in 0..n {
            assert!(ske.push(EntryId::new(slot, 0)));
        }
        assert!(matches!(ske, SameKeyEntry::Large(_)));
        assert!(!ske.push(EntryId::new(0, 0)));
        assert_eq!(ske.len(), n as usize);
        assert_eq!(ske.iter().count(), n as usize);

        for slot in 0..n - 1 {
            assert_eq!(ske.delete(EntryId::new(slot, 0)), (true, false));
        }
        assert_eq!(ske.delete(EntryId::new(0, 0)), (false, false));
        assert_eq!(ske.delete(EntryId::new(n - 1, 0)), (true, true));
    }

    #[test]
    fn small_rejects_duplicates() {
        let mut ske = SameKeyEntry::default();
        assert!(ske.push(EntryId::new(1, 0)));
        assert!(!ske.push(EntryId::new(1, 0)));
        assert!(ske.push(EntryId::new(1, 1)));
        assert_eq!(ske.len(), 2);
    }
}
