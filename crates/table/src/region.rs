//! A region: an in-memory map from keys to values,
//! notifying listeners of every change to its entries.
//!
//! Entries live in an arena of slots.
//! An entry is named by an [`EntryId`], its slot plus the slot's generation.
//! Destroying an entry bumps the generation of its slot before the slot is reused,
//! so an id held for a destroyed entry simply stops resolving.

use ahash::RandomState;
use parking_lot::{Mutex, RwLock};
use regiondb_expr::Value;
use regiondb_primitives::{EntryId, Millis, RegionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegionError {
    #[error("Region `{0}` already exists")]
    AlreadyExists(String),
    #[error("Region `{0}` not found")]
    NotFound(String),
    #[error("`{0}` is not a valid region path")]
    InvalidPath(String),
}

/// A source of last-modified markers.
pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Millis {
        let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Millis(since_epoch.as_millis().try_into().unwrap_or(i64::MAX))
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(start: Millis) -> Self {
        Self(AtomicI64::new(start.0))
    }

    pub fn set(&self, now: Millis) {
        self.0.store(now.0, Ordering::SeqCst);
    }

    /// Moves the clock forward by `ms`, returning the new time.
    pub fn advance(&self, ms: i64) -> Millis {
        Millis(self.0.fetch_add(ms, Ordering::SeqCst) + ms)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.0.load(Ordering::SeqCst))
    }
}

/// A borrowed view of an entry, handed to listeners and scans
/// while the entry's lock is held.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef<'a> {
    pub id: EntryId,
    pub key: &'a Value,
    /// `None` when the entry was invalidated.
    pub value: Option<&'a Value>,
    pub last_modified: Millis,
}

impl EntryRef<'_> {
    pub fn to_snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            id: self.id,
            key: self.key.clone(),
            value: self.value.cloned(),
            last_modified: self.last_modified,
        }
    }
}

/// An owned copy of an entry at some point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySnapshot {
    pub id: EntryId,
    pub key: Value,
    pub value: Option<Value>,
    pub last_modified: Millis,
}

/// Receives the lifecycle events of a region's entries.
///
/// Callbacks run synchronously on the mutating thread
/// while the entry's lock is held,
/// so events for one entry are delivered in order.
/// Implementations must not mutate the region.
pub trait EntryListener: Send + Sync {
    /// `entry` was created, or its value replaced when `is_update`.
    fn on_put(&self, entry: EntryRef<'_>, is_update: bool);
    /// `entry` was destroyed. Its id no longer resolves.
    fn on_destroy(&self, entry: EntryRef<'_>);
    /// The value of `entry` was invalidated. The entry itself survives.
    fn on_invalidate(&self, entry: EntryRef<'_>);
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ListenerId(u32);

struct Stored {
    key: Value,
    value: Option<Value>,
    last_modified: Millis,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    stored: Option<Stored>,
}

impl Slot {
    /// Returns the entry in this slot if it is the one `id` names.
    fn resolve(&self, id: EntryId) -> Option<&Stored> {
        self.stored.as_ref().filter(|_| self.generation == id.generation())
    }

    fn resolve_mut(&mut self, id: EntryId) -> Option<&mut Stored> {
        let live = self.generation == id.generation();
        self.stored.as_mut().filter(|_| live)
    }
}

fn entry_ref(id: EntryId, stored: &Stored) -> EntryRef<'_> {
    EntryRef {
        id,
        key: &stored.key,
        value: stored.value.as_ref(),
        last_modified: stored.last_modified,
    }
}

type Cell = Arc<Mutex<Slot>>;

/// The entries of one region.
///
/// Lock order: `by_key`, then `free`, then `slots`, then a slot's lock.
pub struct Region {
    id: RegionId,
    path: Box<str>,
    clock: Arc<dyn Clock>,
    /// Append-only.
    slots: RwLock<Vec<Cell>>,
    /// Slots whose entry was destroyed, ready for reuse.
    free: Mutex<Vec<u32>>,
    by_key: RwLock<HashMap<Value, EntryId, RandomState>>,
    listeners: RwLock<Vec<(ListenerId, Arc<dyn EntryListener>)>>,
    next_listener: AtomicU32,
}

impl Region {
    pub fn new(id: RegionId, path: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            id,
            path: path.into(),
            clock,
            slots: <_>::default(),
            free: <_>::default(),
            by_key: <_>::default(),
            listeners: <_>::default(),
            next_listener: <_>::default(),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn add_listener(&self, listener: Arc<dyn EntryListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Returns whether the listener was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    fn notify(&self, f: impl Fn(&dyn EntryListener)) {
        for (_, listener) in self.listeners.read().iter() {
            f(&**listener);
        }
    }

    fn cell(&self, id: EntryId) -> Option<Cell> {
        self.slots.read().get(id.idx()).cloned()
    }

    /// Returns a vacant slot, reusing a freed one if possible.
    fn alloc(&self) -> (EntryId, Cell) {
        let reused = self.free.lock().pop();
        if let Some(slot) = reused {
            // Freed slots are never removed from the append-only arena.
            let cell = self.slots.read()[slot as usize].clone();
            let generation = cell.lock().generation;
            return (EntryId::new(slot, generation), cell);
        }
        let mut slots = self.slots.write();
        let slot = slots.len() as u32;
        let cell = Cell::default();
        slots.push(cell.clone());
        (EntryId::new(slot, 0), cell)
    }

    /// Creates or updates the entry `key`, returning its id.
    pub fn put(&self, key: Value, value: Value) -> EntryId {
        loop {
            let existing = self.by_key.read().get(&key).copied();
            if let Some(id) = existing {
                let Some(cell) = self.cell(id) else { continue };
                let mut slot = cell.lock();
                let Some(stored) = slot.resolve_mut(id) else {
                    // Destroyed since we looked it up.
                    continue;
                };
                stored.value = Some(value);
                stored.last_modified = self.clock.now();
                let stored = &*stored;
                self.notify(|l| l.on_put(entry_ref(id, stored), true));
                return id;
            }

            let mut by_key = self.by_key.write();
            if by_key.contains_key(&key) {
                continue;
            }
            let (id, cell) = self.alloc();
            let mut slot = cell.lock();
            by_key.insert(key.clone(), id);
            drop(by_key);
            let stored = slot.stored.insert(Stored {
                key,
                value: Some(value),
                last_modified: self.clock.now(),
            });
            let stored = &*stored;
            self.notify(|l| l.on_put(entry_ref(id, stored), false));
            return id;
        }
    }

    /// Destroys the entry `key`, returning the id it had.
    pub fn destroy(&self, key: &Value) -> Option<EntryId> {
        let mut by_key = self.by_key.write();
        let id = by_key.remove(key)?;
        let cell = self.cell(id)?;
        let mut slot = cell.lock();
        drop(by_key);

        let mut stored = slot.stored.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        stored.last_modified = self.clock.now();
        self.notify(|l| l.on_destroy(entry_ref(id, &stored)));
        drop(slot);

        self.free.lock().push(id.slot());
        Some(id)
    }

    /// Drops the value of the entry `key`, keeping the entry.
    /// Returns the entry's id.
    pub fn invalidate(&self, key: &Value) -> Option<EntryId> {
        loop {
            let id = self.by_key.read().get(key).copied()?;
            let cell = self.cell(id)?;
            let mut slot = cell.lock();
            let Some(stored) = slot.resolve_mut(id) else { continue };
            stored.value = None;
            stored.last_modified = self.clock.now();
            let stored = &*stored;
            self.notify(|l| l.on_invalidate(entry_ref(id, stored)));
            return Some(id);
        }
    }

    pub fn get(&self, key: &Value) -> Option<EntrySnapshot> {
        let id = self.by_key.read().get(key).copied()?;
        self.get_entry(id)
    }

    /// Returns the entry `id` names, unless it was destroyed.
    pub fn get_entry(&self, id: EntryId) -> Option<EntrySnapshot> {
        let cell = self.cell(id)?;
        let slot = cell.lock();
        slot.resolve(id).map(|stored| entry_ref(id, stored).to_snapshot())
    }

    /// The number of live entries.
    pub fn len(&self) -> usize {
        self.by_key.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` for every live entry, holding the entry's lock during the call.
    ///
    /// Entries created or destroyed during the scan may or may not be visited.
    pub fn for_each_live(&self, mut f: impl FnMut(EntryRef<'_>)) {
        let cells = self.slots.read().clone();
        for (idx, cell) in cells.iter().enumerate() {
            let slot = cell.lock();
            if let Some(stored) = &slot.stored {
                f(entry_ref(EntryId::new(idx as u32, slot.generation), stored));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Put(EntryId, bool, Millis),
        Destroy(EntryId),
        Invalidate(EntryId),
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Event>>);

    impl EntryListener for Recorder {
        fn on_put(&self, entry: EntryRef<'_>, is_update: bool) {
            self.0.lock().push(Event::Put(entry.id, is_update, entry.last_modified));
        }
        fn on_destroy(&self, entry: EntryRef<'_>) {
            self.0.lock().push(Event::Destroy(entry.id));
        }
        fn on_invalidate(&self, entry: EntryRef<'_>) {
            assert!(entry.value.is_none());
            self.0.lock().push(Event::Invalidate(entry.id));
        }
    }

    fn region() -> (Region, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Millis(100)));
        (Region::new(RegionId(0), "/portfolios", clock.clone()), clock)
    }

    #[test]
    fn lifecycle_events() {
        let (region, clock) = region();
        let recorder = Arc::new(Recorder::default());
        let lid = region.add_listener(recorder.clone());

        let a = region.put(1.into(), "a".into());
        clock.advance(5);
        assert_eq!(region.put(1.into(), "b".into()), a);
        region.invalidate(&1.into());
        region.destroy(&1.into());
        assert_eq!(region.destroy(&1.into()), None);
        assert_eq!(region.invalidate(&1.into()), None);

        assert_eq!(
            *recorder.0.lock(),
            [
                Event::Put(a, false, Millis(100)),
                Event::Put(a, true, Millis(105)),
                Event::Invalidate(a),
                Event::Destroy(a),
            ]
        );

        assert!(region.remove_listener(lid));
        assert!(!region.remove_listener(lid));
        region.put(2.into(), "c".into());
        assert_eq!(recorder.0.lock().len(), 4);
    }

    #[test]
    fn destroyed_ids_stop_resolving() {
        let (region, _) = region();
        let old = region.put(1.into(), "a".into());
        region.destroy(&1.into());
        assert_eq!(region.get_entry(old), None);

        // The slot is reused under a new generation.
        let new = region.put(2.into(), "b".into());
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new, old);
        assert_eq!(region.get_entry(old), None);
        assert_eq!(region.get_entry(new).unwrap().value, Some("b".into()));
    }

    #[test]
    fn invalidated_entries_survive() {
        let (region, _) = region();
        let id = region.put(1.into(), "a".into());
        assert_eq!(region.invalidate(&1.into()), Some(id));
        let entry = region.get(&1.into()).unwrap();
        assert_eq!((entry.id, entry.value), (id, None));
        assert_eq!(region.len(), 1);
    }

    #[test]
    fn scan_visits_live_entries() {
        let (region, _) = region();
        for k in 0..10 {
            region.put(k.into(), (k * 10).into());
        }
        for k in (0..10).step_by(2) {
            region.destroy(&k.into());
        }
        let mut seen = Vec::new();
        region.for_each_live(|e| seen.push(e.key.clone()));
        seen.sort();
        assert_eq!(seen, (1..10).step_by(2).map(Value::from).collect::<Vec<_>>());
        assert_eq!(region.len(), 5);
    }

    #[test]
    fn concurrent_puts_and_destroys() {
        let (region, _) = region();
        std::thread::scope(|s| {
            for t in 0..4i64 {
                let region = &region;
                s.spawn(move || {
                    for i in 0..500i64 {
                        let key = Value::from(i % 16);
                        if (i + t) % 3 == 0 {
                            region.destroy(&key);
                        } else {
                            region.put(key, t.into());
                        }
                    }
                });
            }
        });
        let mut live = 0;
        region.for_each_live(|_| live += 1);
        assert_eq!(live, region.len());
    }
}
