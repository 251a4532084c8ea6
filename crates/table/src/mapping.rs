//! The concurrent table relating index keys to region entries.

use crate::table_index::{IndexCannotSeekRange, IndexSeekRangeResult, TypedIndex};
use ahash::RandomState;
use core::ops::RangeBounds;
use parking_lot::{Mutex, RwLock};
use regiondb_expr::{KeySet, Value};
use regiondb_primitives::{EntryId, IndexKind, Millis};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// What a mapping table records about one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMapping {
    /// The keys the entry is related to, ascending and distinct.
    pub keys: KeySet,
    /// The last-modified marker of the entry when `keys` were evaluated.
    pub last_modified: Millis,
}

/// The outcome of [`MappingTable::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The entry was not mapped before.
    Inserted,
    /// The entry was mapped and its mapping was replaced.
    Updated { keys_changed: bool },
    /// The table is closed; nothing changed.
    Closed,
}

type EntryShard = HashMap<EntryId, EntryMapping, RandomState>;

/// Relates index keys to the entries having them, and entries to their keys.
///
/// The table is split into independently locked shards.
/// Keys are assigned to a key shard by hash, entries to an entry shard by slot.
/// A writer holds the lock of the entry's shard for the whole operation,
/// so operations on the same entry are serialized,
/// and takes the lock of each affected key shard briefly.
/// Readers only ever take key shard locks, for reading.
///
/// The table does not order writes to the same entry by their markers.
/// Callers deliver the mutations of an entry one at a time and in order.
///
/// Lock order: entry shard, then key shard.
pub struct MappingTable {
    kind: IndexKind,
    key_shards: Box<[RwLock<TypedIndex>]>,
    entry_shards: Box<[Mutex<EntryShard>]>,
    hasher: RandomState,
    /// Set by [`MappingTable::close`]; checked under the entry shard lock.
    closed: AtomicBool,
}

impl MappingTable {
    /// Returns an empty table storing keys for an index of `kind`
    /// with `shards` rounded up to a power of two.
    pub fn new(kind: IndexKind, shards: usize) -> Self {
        let n = shards.max(1).next_power_of_two();
        Self {
            kind,
            key_shards: (0..n).map(|_| RwLock::new(TypedIndex::new(kind))).collect(),
            entry_shards: (0..n).map(|_| Mutex::default()).collect(),
            hasher: RandomState::with_seeds(0x243f_6a88, 0x85a3_08d3, 0x1319_8a2e, 0x0370_7344),
            closed: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn num_shards(&self) -> usize {
        self.key_shards.len()
    }

    fn key_shard(&self, key: &Value) -> &RwLock<TypedIndex> {
        let mask = self.key_shards.len() - 1;
        &self.key_shards[self.hasher.hash_one(key) as usize & mask]
    }

    fn entry_shard(&self, entry: EntryId) -> &Mutex<EntryShard> {
        let mask = self.entry_shards.len() - 1;
        &self.entry_shards[entry.idx() & mask]
    }

    /// Relates `entry` to exactly `keys`,
    /// replacing whatever it was related to before.
    ///
    /// Does nothing once the table is closed.
    pub fn upsert(&self, entry: EntryId, mut keys: KeySet, last_modified: Millis) -> Upsert {
        keys.sort_unstable();
        keys.dedup();

        let mut entries = self.entry_shard(entry).lock();
        if self.is_closed() {
            return Upsert::Closed;
        }
        match entries.get_mut(&entry) {
            Some(mapping) => {
                let keys_changed = mapping.keys != keys;
                if keys_changed {
                    // Add the new relations before dropping the old ones
                    // so that a concurrent reader never misses the entry.
                    for key in keys.iter().filter(|k| mapping.keys.binary_search(k).is_err()) {
                        self.key_shard(key).write().insert(key.clone(), entry);
                    }
                    for key in mapping.keys.iter().filter(|k| keys.binary_search(k).is_err()) {
                        self.key_shard(key).write().delete(key, entry);
                    }
                    mapping.keys = keys;
                }
                mapping.last_modified = last_modified;
                Upsert::Updated { keys_changed }
            }
            None => {
                for key in &keys {
                    self.key_shard(key).write().insert(key.clone(), entry);
                }
                entries.insert(entry, EntryMapping { keys, last_modified });
                Upsert::Inserted
            }
        }
    }

    /// Removes every relation of `entry`, returning what was recorded for it.
    ///
    /// Returns `None` when `entry` is not mapped,
    /// e.g., because its removal was already processed.
    pub fn remove(&self, entry: EntryId) -> Option<EntryMapping> {
        let mut entries = self.entry_shard(entry).lock();
        let mapping = entries.remove(&entry)?;
        for key in &mapping.keys {
            self.key_shard(key).write().delete(key, entry);
        }
        Some(mapping)
    }

    /// Returns what is recorded for `entry`.
    pub fn get(&self, entry: EntryId) -> Option<EntryMapping> {
        self.entry_shard(entry).lock().get(&entry).cloned()
    }

    /// Returns the entries related to `key`.
    pub fn seek_point(&self, key: &Value) -> Vec<EntryId> {
        self.key_shard(key).read().seek_point(key).collect()
    }

    /// Returns the entries related to any key in `range`.
    ///
    /// Entries are ordered by key within a shard, but not across shards.
    /// Fails for hashed indexes.
    pub fn seek_range(&self, range: &impl RangeBounds<Value>) -> IndexSeekRangeResult<Vec<EntryId>> {
        if !self.kind.is_ordered() {
            return Err(IndexCannotSeekRange);
        }
        let mut found = Vec::new();
        for shard in self.key_shards.iter() {
            found.extend(shard.read().seek_range(range)?);
        }
        Ok(found)
    }

    /// Empties the table for good.
    ///
    /// Upserts that already hold their entry's shard are undone by the clear,
    /// and later ones see the table closed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Removes every relation, leaving the table empty.
    pub fn clear(&self) {
        // Hold every entry shard so no writer runs while key shards are cleared.
        let mut entries: Vec<_> = self.entry_shards.iter().map(|shard| shard.lock()).collect();
        for shard in self.key_shards.iter() {
            shard.write().clear();
        }
        for shard in &mut entries {
            shard.clear();
        }
    }

    /// The number of distinct keys.
    pub fn num_keys(&self) -> usize {
        self.key_shards.iter().map(|shard| shard.read().num_keys()).sum()
    }

    /// The number of `key -> entry` relations.
    pub fn num_values(&self) -> usize {
        self.key_shards.iter().map(|shard| shard.read().num_rows()).sum()
    }

    /// The number of entries mapped, including those without keys.
    pub fn num_entries(&self) -> usize {
        self.entry_shards.iter().map(|shard| shard.lock().len()).sum()
    }
}
