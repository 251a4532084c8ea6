//! The indexes of one region.

use crate::error::IndexError;
use crate::index::Index;
use parking_lot::{Mutex, RwLock};
use regiondb_expr::{CanonicalDefs, PathExpr};
use regiondb_primitives::{IndexId, IndexKind, RemovalKind};
use regiondb_table::{EntryListener, EntryRef, Region};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

/// The indexes of a region, in creation order.
pub type IndexList = Arc<[Arc<Index>]>;

/// The index catalog of one region.
///
/// Readers take a snapshot of the published index list,
/// which writers replace wholesale.
/// Creation and removal of indexes are serialized.
///
/// The manager also listens to the region's entry lifecycle
/// and forwards every change to each of its indexes.
pub struct IndexManager {
    region: Weak<Region>,
    region_path: Box<str>,
    indexes: RwLock<IndexList>,
    /// Serializes writers of `indexes`.
    writer: Mutex<()>,
    next_id: AtomicU32,
    shards: usize,
}

impl IndexManager {
    pub fn new(region: &Arc<Region>, shards: usize) -> Self {
        Self {
            region: Arc::downgrade(region),
            region_path: region.path().into(),
            indexes: RwLock::new(Vec::new().into()),
            writer: Mutex::new(()),
            next_id: AtomicU32::new(0),
            shards,
        }
    }

    pub fn region_path(&self) -> &str {
        &self.region_path
    }

    fn region(&self) -> Result<Arc<Region>, IndexError> {
        self.region
            .upgrade()
            .ok_or_else(|| IndexError::RegionNotFound(self.region_path.to_string()))
    }

    fn publish(&self, indexes: Vec<Arc<Index>>) {
        *self.indexes.write() = indexes.into();
    }

    fn validate(&self, name: &str, kind: IndexKind, expr: &PathExpr, defs: &CanonicalDefs) -> Result<(), IndexError> {
        if name.is_empty() {
            return Err(IndexError::invalid(name, "the name is empty"));
        }
        if defs.region_path() != &*self.region_path {
            return Err(IndexError::invalid(
                name,
                format!("`{}` is not the region `{}`", defs.region_path(), self.region_path),
            ));
        }
        if defs.num_regions() != 1 {
            return Err(IndexError::invalid(name, "an index may iterate only one region"));
        }
        if !(1..=defs.len()).contains(&expr.iter) {
            return Err(IndexError::invalid(
                name,
                format!("`{expr}` refers to an iterator outside `{defs}`"),
            ));
        }
        if !kind.allows_nested_iterators() && defs.len() != 1 {
            return Err(IndexError::invalid(
                name,
                format!("a {kind} index must have exactly one iteration definition"),
            ));
        }
        Ok(())
    }

    /// Creates the index `name`, maps every entry of the region
    /// and registers the index for maintenance.
    ///
    /// The index is visible to lookups as soon as it is registered,
    /// but reports [`Index::is_populated`] only once the initial scan is done.
    /// On failure, nothing is registered.
    pub fn create_index(
        &self,
        name: &str,
        kind: IndexKind,
        indexed_expr: PathExpr,
        defs: CanonicalDefs,
    ) -> Result<Arc<Index>, IndexError> {
        log::trace!(
            "INDEX CREATING: {name} on region: {} with kind: {kind}, expression: {indexed_expr}, from: {defs}",
            self.region_path
        );
        let region = self.region()?;
        let _writer = self.writer.lock();

        if self.lookup(name).is_some() {
            return Err(IndexError::NameConflict {
                region: self.region_path.to_string(),
                name: name.to_owned(),
            });
        }
        self.validate(name, kind, &indexed_expr, &defs)?;

        let id = IndexId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let index = Arc::new(Index::new(id, name, kind, indexed_expr, defs, self.shards));

        // Register before scanning so that no mutation racing with the scan is missed.
        let mut indexes = self.all().to_vec();
        indexes.push(index.clone());
        self.publish(indexes);
        index.populate(&region);

        log::trace!(
            "INDEX CREATED: {name} with id: {id} on region: {}, keys: {}",
            self.region_path,
            index.statistics().num_keys
        );
        Ok(index)
    }

    /// Removes the index `name`, returning whether it existed.
    pub fn remove_index(&self, name: &str) -> bool {
        log::trace!("INDEX DROPPING: {name}");
        let _writer = self.writer.lock();
        let all = self.all();
        let Some(removed) = all.iter().find(|index| index.name() == name) else {
            return false;
        };
        self.publish(all.iter().filter(|index| index.name() != name).cloned().collect());
        removed.clear();
        log::trace!("INDEX DROPPED: {name}");
        true
    }

    /// Removes every index of the region.
    pub fn remove_all(&self) {
        let _writer = self.writer.lock();
        let all = self.all();
        self.publish(Vec::new());
        for index in all.iter() {
            index.clear();
            log::trace!("INDEX DROPPED: {}", index.name());
        }
    }

    /// Clears the index `name` and maps every entry of the region again.
    pub fn rebuild_index(&self, name: &str) -> Result<(), IndexError> {
        let region = self.region()?;
        let _writer = self.writer.lock();
        let index = self
            .lookup(name)
            .ok_or_else(|| IndexError::IndexNotFound(name.to_owned()))?;
        log::trace!("INDEX REBUILDING: {name}");
        index.rebuild(&region);
        log::trace!("INDEX REBUILT: {name}");
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Index>> {
        self.all().iter().find(|index| index.name() == name).cloned()
    }

    /// Returns a snapshot of the region's indexes, in creation order.
    pub fn all(&self) -> IndexList {
        self.indexes.read().clone()
    }
}

impl EntryListener for IndexManager {
    fn on_put(&self, entry: EntryRef<'_>, is_update: bool) {
        for index in self.all().iter() {
            if is_update {
                index.update_mapping(entry);
            } else {
                index.add_mapping(entry);
            }
        }
    }

    fn on_destroy(&self, entry: EntryRef<'_>) {
        for index in self.all().iter() {
            index.remove_mapping(entry.id, RemovalKind::Destroy);
        }
    }

    fn on_invalidate(&self, entry: EntryRef<'_>) {
        for index in self.all().iter() {
            index.remove_mapping(entry.id, RemovalKind::Invalidate);
        }
    }
}
