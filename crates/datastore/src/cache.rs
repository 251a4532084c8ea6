//! The regions of a member and their index catalogs.

use crate::Result;
use crate::arbiter::StalenessArbiter;
use crate::catalog::{IndexList, IndexManager};
use crate::config::IndexConfig;
use crate::error::IndexError;
use crate::index::Index;
use ahash::RandomState;
use parking_lot::RwLock;
use regiondb_expr::{CanonicalDefs, FromClause, IterDef, PathExpr, RegionView};
use regiondb_primitives::{IndexKind, RegionId};
use regiondb_table::{Clock, ListenerId, Region, RegionError};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

struct RegionHandle {
    region: Arc<Region>,
    indexes: Arc<IndexManager>,
    listener: ListenerId,
}

/// Owns the regions of this member and the indexes over them.
///
/// The configuration is fixed at construction
/// and handed to every index and to the [`StalenessArbiter`].
pub struct Cache {
    config: IndexConfig,
    clock: Arc<dyn Clock>,
    arbiter: StalenessArbiter,
    regions: RwLock<HashMap<Box<str>, RegionHandle, RandomState>>,
    next_region: AtomicU32,
}

impl Cache {
    pub fn new(config: IndexConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            arbiter: StalenessArbiter::from_config(&config),
            config,
            clock,
            regions: <_>::default(),
            next_region: AtomicU32::new(0),
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn arbiter(&self) -> &StalenessArbiter {
        &self.arbiter
    }

    /// Creates the region at `path`, e.g., `/portfolios`.
    pub fn create_region(&self, path: &str) -> Result<Arc<Region>> {
        match path.parse::<IterDef>() {
            Ok(IterDef::Region {
                view: RegionView::Values,
                path: parsed,
            }) if &*parsed == path => {}
            _ => return Err(RegionError::InvalidPath(path.to_owned()).into()),
        }
        let mut regions = self.regions.write();
        if regions.contains_key(path) {
            return Err(RegionError::AlreadyExists(path.to_owned()).into());
        }
        let id = RegionId(self.next_region.fetch_add(1, Ordering::Relaxed));
        let region = Arc::new(Region::new(id, path, self.clock.clone()));
        let indexes = Arc::new(IndexManager::new(&region, self.config.mapping_shards));
        let listener = region.add_listener(indexes.clone());
        regions.insert(
            path.into(),
            RegionHandle {
                region: region.clone(),
                indexes,
                listener,
            },
        );
        log::debug!("REGION CREATED: {path} with id: {id}");
        Ok(region)
    }

    /// Destroys the region at `path` together with its indexes.
    pub fn destroy_region(&self, path: &str) -> Result<()> {
        let handle = self
            .regions
            .write()
            .remove(path)
            .ok_or_else(|| RegionError::NotFound(path.to_owned()))?;
        handle.region.remove_listener(handle.listener);
        handle.indexes.remove_all();
        log::debug!("REGION DESTROYED: {path}");
        Ok(())
    }

    pub fn region(&self, path: &str) -> Option<Arc<Region>> {
        self.regions.read().get(path).map(|h| h.region.clone())
    }

    /// Returns the index catalog of the region at `path`.
    pub fn index_manager(&self, path: &str) -> Option<Arc<IndexManager>> {
        self.regions.read().get(path).map(|h| h.indexes.clone())
    }

    fn index_manager_or_err(&self, path: &str) -> std::result::Result<Arc<IndexManager>, IndexError> {
        self.index_manager(path)
            .ok_or_else(|| IndexError::RegionNotFound(path.to_owned()))
    }

    /// Creates an index over the region named by the first of `defs`.
    pub fn create_index(
        &self,
        name: &str,
        kind: IndexKind,
        indexed_expr: PathExpr,
        defs: CanonicalDefs,
    ) -> Result<Arc<Index>> {
        let manager = self.index_manager_or_err(defs.region_path())?;
        Ok(manager.create_index(name, kind, indexed_expr, defs)?)
    }

    /// Creates an index from its textual form,
    /// e.g., `create_index_from("secIdIndex", kind, "pos.secId", "/portfolios p, p.positions pos")`.
    pub fn create_index_from(
        &self,
        name: &str,
        kind: IndexKind,
        indexed_expr: &str,
        from_clause: &str,
    ) -> Result<Arc<Index>> {
        let from = FromClause::parse(from_clause)?;
        let expr = from.resolve_path(indexed_expr)?;
        self.create_index(name, kind, expr, from.into_defs())
    }

    /// Removes the index `name` of the region at `region_path`,
    /// returning whether it existed.
    pub fn remove_index(&self, region_path: &str, name: &str) -> bool {
        self.index_manager(region_path)
            .is_some_and(|manager| manager.remove_index(name))
    }

    pub fn lookup(&self, region_path: &str, name: &str) -> Option<Arc<Index>> {
        self.index_manager(region_path)?.lookup(name)
    }

    /// Returns the indexes of the region at `region_path`, in creation order.
    pub fn all_for_region(&self, region_path: &str) -> IndexList {
        self.index_manager(region_path)
            .map(|manager| manager.all())
            .unwrap_or_else(|| Vec::new().into())
    }

    pub fn rebuild_index(&self, region_path: &str, name: &str) -> Result<()> {
        Ok(self.index_manager_or_err(region_path)?.rebuild_index(name)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatastoreError;
    use regiondb_expr::Value;
    use regiondb_table::ManualClock;

    fn cache() -> Cache {
        Cache::new(IndexConfig::default(), Arc::new(ManualClock::default()))
    }

    #[test]
    fn regions() {
        let cache = cache();
        cache.create_region("/portfolios").unwrap();
        assert!(matches!(
            cache.create_region("/portfolios"),
            Err(DatastoreError::Region(RegionError::AlreadyExists(_)))
        ));
        for bad in ["portfolios", "/p.keySet()", "/p//q"] {
            assert!(
                matches!(cache.create_region(bad), Err(DatastoreError::Region(RegionError::InvalidPath(_)))),
                "{bad}"
            );
        }
        cache.destroy_region("/portfolios").unwrap();
        assert!(cache.region("/portfolios").is_none());
        assert!(matches!(
            cache.destroy_region("/portfolios"),
            Err(DatastoreError::Region(RegionError::NotFound(_)))
        ));
    }

    #[test]
    fn index_on_missing_region() {
        let cache = cache();
        let err = cache
            .create_index_from("statusIndex", IndexKind::Functional, "status", "/portfolios")
            .unwrap_err();
        assert_eq!(
            err.into_index().unwrap(),
            IndexError::RegionNotFound("/portfolios".into())
        );
    }

    #[test]
    fn index_from_text() {
        let cache = cache();
        let region = cache.create_region("/portfolios").unwrap();
        region.put(
            1.into(),
            Value::object([(
                "positions",
                Value::list([
                    Value::object([("secId", Value::from("IBM"))]),
                    Value::object([("secId", Value::from("SUN"))]),
                ]),
            )]),
        );
        let index = cache
            .create_index_from("secIdIndex", IndexKind::Functional, "pos.secId", "/portfolios p, p.positions pos")
            .unwrap();
        assert_eq!(index.defs().to_strings(), ["/portfolios", "index_iter1.positions"]);
        assert_eq!(index.indexed_expr().to_string(), "index_iter2.secId");
        assert_eq!(index.statistics().num_keys, 2);

        assert!(cache.lookup("/portfolios", "secIdIndex").is_some());
        assert_eq!(cache.all_for_region("/portfolios").len(), 1);
        assert!(cache.all_for_region("/nope").is_empty());
        cache.rebuild_index("/portfolios", "secIdIndex").unwrap();
        assert!(cache.remove_index("/portfolios", "secIdIndex"));
        assert!(!cache.remove_index("/portfolios", "secIdIndex"));
    }

    #[test]
    fn parse_errors_surface() {
        let cache = cache();
        cache.create_region("/portfolios").unwrap();
        let err = cache
            .create_index_from("i", IndexKind::Functional, "p.status", "/portfolios p, p.x p")
            .unwrap_err();
        assert!(err.is_parse());
    }

    #[test]
    fn destroyed_region_stops_maintenance() {
        let cache = cache();
        let region = cache.create_region("/portfolios").unwrap();
        let index = cache
            .create_index_from("statusIndex", IndexKind::Functional, "status", "/portfolios")
            .unwrap();
        cache.destroy_region("/portfolios").unwrap();
        region.put(1.into(), Value::object([("status", Value::from("active"))]));
        assert_eq!(index.statistics().num_values, 0);
        assert!(!index.is_populated());
    }
}
