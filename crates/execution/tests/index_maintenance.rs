//! Queries served by each kind of index while the region changes underneath,
//! once with every candidate re-checked against the predicate
//! and once trusting the index outright.

use core::ops::Bound::*;
use pretty_assertions::assert_eq;
use regiondb_datastore::cache::Cache;
use regiondb_datastore::config::IndexConfig;
use regiondb_datastore::index::Index;
use regiondb_execution::{QueryResult, execute, execute_plan};
use regiondb_expr::{CanonicalDefs, Value};
use regiondb_physical_plan::compile;
use regiondb_physical_plan::plan::{Sarg, Select};
use regiondb_primitives::{IndexKind, RemovalKind};
use regiondb_table::{ManualClock, Region};
use std::sync::Arc;

const KINDS: [IndexKind; 4] = [
    IndexKind::Functional,
    IndexKind::Range,
    IndexKind::CompactRange,
    IndexKind::Hash,
];

fn configs() -> [IndexConfig; 2] {
    [
        IndexConfig::default(),
        IndexConfig::default().with_update_window_ms(i64::MIN),
    ]
}

struct Fixture {
    cache: Cache,
    region: Arc<Region>,
    clock: Arc<ManualClock>,
}

fn setup(config: IndexConfig) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::default());
    let cache = Cache::new(config, clock.clone());
    let region = cache.create_region("/portfolios").unwrap();
    Fixture { cache, region, clock }
}

/// Portfolio `id`, active when `id` is even.
fn portfolio(id: i64) -> Value {
    Value::object([
        ("ID", Value::from(id)),
        ("status", Value::from(if id % 2 == 0 { "active" } else { "inactive" })),
    ])
}

fn status_index(f: &Fixture, kind: IndexKind) -> Arc<Index> {
    f.cache
        .create_index_from("statusIndex", kind, "status", "/portfolios")
        .unwrap()
}

fn status_is(sarg: Sarg) -> Select {
    Select::new(
        CanonicalDefs::parse(&["/portfolios"]).unwrap(),
        "index_iter1.status".parse().unwrap(),
        sarg,
    )
}

fn id_index(f: &Fixture, kind: IndexKind) -> Arc<Index> {
    f.cache.create_index_from("idIndex", kind, "ID", "/portfolios").unwrap()
}

fn id_is(sarg: Sarg) -> Select {
    Select::new(
        CanonicalDefs::parse(&["/portfolios"]).unwrap(),
        "index_iter1.ID".parse().unwrap(),
        sarg,
    )
}

fn active() -> Select {
    status_is(Sarg::Eq("active".into()))
}

fn values(result: &QueryResult) -> Vec<Value> {
    result.entries.iter().filter_map(|e| e.value.clone()).collect()
}

fn for_each_setup(test: impl Fn(Fixture, IndexKind)) {
    for config in configs() {
        for kind in KINDS {
            test(setup(config), kind);
        }
    }
}

#[test]
fn query_returns_entry_that_is_in_index() {
    for_each_setup(|f, kind| {
        let index = status_index(&f, kind);
        f.region.put(0.into(), portfolio(0));
        f.region.put(1.into(), portfolio(1));

        let result = execute(&f.cache, active()).unwrap();
        assert_eq!(result.index.as_deref(), Some("statusIndex"));
        assert_eq!(values(&result), [portfolio(0)]);
        assert_eq!(index.statistics().total_uses, 1);
    });
}

#[test]
fn query_does_not_return_destroyed_entry() {
    for_each_setup(|f, kind| {
        let index = status_index(&f, kind);
        f.region.put(0.into(), portfolio(0));
        f.region.destroy(&0.into());

        let result = execute(&f.cache, active()).unwrap();
        assert!(values(&result).is_empty());
        assert_eq!(index.statistics().total_uses, 1);
    });
}

#[test]
fn query_does_not_return_updated_entry_that_no_longer_matches() {
    for_each_setup(|f, kind| {
        let index = status_index(&f, kind);
        f.region.put(0.into(), portfolio(0));
        f.region.put(0.into(), portfolio(1));

        let result = execute(&f.cache, active()).unwrap();
        assert!(values(&result).is_empty());
        assert_eq!(index.statistics().total_uses, 1);
    });
}

#[test]
fn query_returns_updated_entry_that_now_matches() {
    for_each_setup(|f, kind| {
        let index = status_index(&f, kind);
        f.region.put(0.into(), portfolio(1));
        f.region.put(0.into(), portfolio(0));
        assert_eq!(index.statistics().total_uses, 0);

        let result = execute(&f.cache, active()).unwrap();
        assert_eq!(values(&result), [portfolio(0)]);
        assert_eq!(index.statistics().total_uses, 1);
    });
}

#[test]
fn removing_mapping_of_destroyed_entry_is_a_no_op() {
    for_each_setup(|f, kind| {
        let index = f
            .cache
            .create_index_from("statusIndex", kind, "value.status", "/portfolios.entrySet()")
            .unwrap();
        let id = f.region.put("KEY-1".into(), portfolio(1));
        f.region.destroy(&"KEY-1".into());
        let before = index.statistics();

        index.remove_mapping(id, RemovalKind::Other);
        index.remove_mapping(id, RemovalKind::Destroy);
        assert_eq!(index.statistics(), before);
        assert_eq!(index.mapping(id), None);
    });
}

#[test]
fn not_equal_to_several_values() {
    for config in configs() {
        for kind in [IndexKind::Functional, IndexKind::Range, IndexKind::CompactRange] {
            let f = setup(config);
            status_index(&f, kind);
            let statuses = ["active", "inactive", "closed", "pending"];
            for (i, status) in statuses.into_iter().enumerate() {
                f.region.put((i as i64).into(), Value::object([("status", Value::from(status))]));
            }
            f.region.put(10.into(), Value::object([("status", Value::Null)]));
            f.region.put(11.into(), Value::object([("other", Value::from(1))]));

            let select = status_is(Sarg::NotEq(vec!["active".into(), "closed".into()]));
            let result = execute(&f.cache, select).unwrap();
            assert_eq!(result.index.as_deref(), Some("statusIndex"));
            let keys: Vec<_> = result.entries.iter().map(|e| e.key.clone()).collect();
            assert_eq!(keys, [Value::from(1), Value::from(3)]);
        }
    }
}

#[test]
fn hash_index_cannot_serve_ranges() {
    let f = setup(IndexConfig::default());
    let index = status_index(&f, IndexKind::Hash);
    f.region.put(0.into(), portfolio(0));

    let select = status_is(Sarg::Range(Included("a".into()), Excluded("b".into())));
    let result = execute(&f.cache, select).unwrap();
    assert_eq!(result.index, None);
    assert_eq!(values(&result), [portfolio(0)]);
    assert_eq!(index.statistics().total_uses, 0);
}

#[test]
fn range_query_over_nested_collection() {
    for config in configs() {
        let f = setup(config);
        f.cache
            .create_index_from("idIndex", IndexKind::Range, "pos.qty", "/portfolios p, p.positions pos")
            .unwrap();
        let with_positions = |qtys: &[i64]| {
            Value::object([(
                "positions",
                Value::list(qtys.iter().map(|q| Value::object([("qty", Value::from(*q))]))),
            )])
        };
        f.region.put(0.into(), with_positions(&[1, 50]));
        f.region.put(1.into(), with_positions(&[5, 7]));
        f.region.put(2.into(), with_positions(&[]));
        f.region.put(3.into(), with_positions(&[100]));

        let select = Select::new(
            CanonicalDefs::parse(&["/portfolios", "index_iter1.positions"]).unwrap(),
            "index_iter2.qty".parse().unwrap(),
            Sarg::Range(Included(5.into()), Included(50.into())),
        );
        let result = execute(&f.cache, select).unwrap();
        assert_eq!(result.index.as_deref(), Some("idIndex"));
        // Entry 1 has two positions in range, but is returned once.
        let keys: Vec<_> = result.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(keys, [Value::from(0), Value::from(1)]);
    }
}

#[test]
fn empty_ranges_return_nothing() {
    for config in configs() {
        for kind in [IndexKind::Functional, IndexKind::Range, IndexKind::CompactRange] {
            let f = setup(config);
            id_index(&f, kind);
            for i in 0..10 {
                f.region.put(i.into(), portfolio(i));
            }
            for sarg in [
                Sarg::Range(Included(5.into()), Included(3.into())),
                Sarg::Range(Excluded(4.into()), Excluded(4.into())),
                Sarg::Range(Unbounded, Excluded(Value::Null)),
                Sarg::Range(Unbounded, Included(Value::Undefined)),
            ] {
                let result = execute(&f.cache, id_is(sarg)).unwrap();
                assert_eq!(result.index.as_deref(), Some("idIndex"));
                assert!(result.entries.is_empty());
            }
        }
    }
}

#[test]
fn later_put_wins_when_the_clock_steps_back() {
    for_each_setup(|f, kind| {
        id_index(&f, kind);
        f.clock.set(1_000_000.into());
        f.region.put(0.into(), portfolio(1));
        f.clock.set(999_000.into());
        f.region.put(0.into(), portfolio(2));
        f.clock.set(2_000_000.into());

        let result = execute(&f.cache, id_is(Sarg::Eq(2.into()))).unwrap();
        assert_eq!(result.index.as_deref(), Some("idIndex"));
        assert_eq!(values(&result), [portfolio(2)]);
        let result = execute(&f.cache, id_is(Sarg::Eq(1.into()))).unwrap();
        assert!(values(&result).is_empty());
    });
}

#[test]
fn plans_whose_index_was_rebuilt_or_dropped() {
    for config in configs() {
        let f = setup(config);
        status_index(&f, IndexKind::Functional);
        for i in 0..4 {
            f.region.put(i.into(), portfolio(i));
        }
        let plan = compile(active(), &f.cache.all_for_region("/portfolios"));
        assert_eq!(plan.index().map(|i| i.name()), Some("statusIndex"));

        f.cache.rebuild_index("/portfolios", "statusIndex").unwrap();
        let result = execute_plan(&f.cache, &f.region, &plan).unwrap();
        assert_eq!(result.index.as_deref(), Some("statusIndex"));
        assert_eq!(values(&result), [portfolio(0), portfolio(2)]);

        assert!(f.cache.remove_index("/portfolios", "statusIndex"));
        let result = execute_plan(&f.cache, &f.region, &plan).unwrap();
        assert_eq!(result.index, None);
        assert_eq!(values(&result), [portfolio(0), portfolio(2)]);
    }
}

#[test]
fn queries_during_rebuilds_see_every_match() {
    let f = setup(IndexConfig::default().with_update_window_ms(i64::MIN));
    status_index(&f, IndexKind::Range);
    for i in 0..200 {
        f.region.put(i.into(), portfolio(i));
    }
    let plan = compile(active(), &f.cache.all_for_region("/portfolios"));
    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..20 {
                f.cache.rebuild_index("/portfolios", "statusIndex").unwrap();
            }
        });
        s.spawn(|| {
            for _ in 0..100 {
                let result = execute_plan(&f.cache, &f.region, &plan).unwrap();
                assert_eq!(result.entries.len(), 100);
            }
        });
    });
}

#[test]
fn stale_candidates_are_reevaluated_only_within_the_window() {
    let f = setup(IndexConfig::default().with_update_window_ms(10));
    status_index(&f, IndexKind::Functional);
    f.region.put(0.into(), portfolio(0));

    f.clock.set(10.into());
    let result = execute(&f.cache, active()).unwrap();
    assert_eq!((result.num_candidates, result.num_reevaluated), (1, 1));

    f.clock.set(11.into());
    let result = execute(&f.cache, active()).unwrap();
    assert_eq!((result.num_candidates, result.num_reevaluated), (1, 0));
    assert_eq!(values(&result), [portfolio(0)]);
}

#[test]
fn queries_without_a_usable_index_scan_the_region() {
    let f = setup(IndexConfig::default());
    f.cache
        .create_index_from("secIdIndex", IndexKind::Functional, "pos.secId", "/portfolios p, p.positions pos")
        .unwrap();
    f.region.put(0.into(), portfolio(0));
    f.region.put(1.into(), portfolio(1));

    // The index does not serve `status` over `/portfolios`.
    let result = execute(&f.cache, active()).unwrap();
    assert_eq!(result.index, None);
    assert_eq!(values(&result), [portfolio(0)]);
}

#[test]
fn errors() {
    let f = setup(IndexConfig::default());
    let select = Select::new(
        CanonicalDefs::parse(&["/nowhere"]).unwrap(),
        "index_iter1.status".parse().unwrap(),
        Sarg::Eq("active".into()),
    );
    assert!(execute(&f.cache, select).is_err());

    let select = Select::new(
        CanonicalDefs::parse(&["/portfolios", "/portfolios"]).unwrap(),
        "index_iter1.status".parse().unwrap(),
        Sarg::Eq("active".into()),
    );
    assert!(execute(&f.cache, select).is_err());
}

#[test]
fn concurrent_writers_and_readers() {
    let f = setup(IndexConfig::default());
    let index = status_index(&f, IndexKind::Functional);
    std::thread::scope(|s| {
        for t in 0..4i64 {
            let region = &f.region;
            s.spawn(move || {
                for i in 0..250 {
                    let key = t * 1000 + i;
                    region.put(key.into(), portfolio(i));
                    region.put(key.into(), portfolio(i + 1));
                    if i % 3 == 0 {
                        region.destroy(&key.into());
                    }
                }
            });
        }
        s.spawn(|| {
            for _ in 0..50 {
                let result = execute(&f.cache, active()).unwrap();
                for entry in &result.entries {
                    assert_eq!(entry.value.as_ref().map(|v| v.attr("status")), Some(Some(&"active".into())));
                }
            }
        });
    });

    let result = execute(&f.cache, active()).unwrap();
    let scanned = {
        let mut n = 0;
        f.region.for_each_live(|e| {
            if e.value.and_then(|v| v.attr("status")) == Some(&"active".into()) {
                n += 1;
            }
        });
        n
    };
    assert_eq!(result.entries.len(), scanned);
    assert_eq!(index.statistics().total_uses, 51);
    assert_eq!(index.statistics().num_values, f.region.len() as u64);
}
