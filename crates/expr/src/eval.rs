use crate::canonical::{CanonicalDefs, IterDef, PathExpr};
use crate::errors::EvalError;
use crate::value::Value;
use smallvec::SmallVec;

/// The distinct keys one entry contributes to an index, in ascending order.
pub type KeySet = SmallVec<[Value; 1]>;

/// Calls `f` once for every combination of values bound to `defs`,
/// with the first definition bound to `root`.
///
/// Nested definitions must evaluate to a list.
/// `Undefined` and `Null` are treated as empty collections.
/// Definitions naming a region other than the first cannot be bound from a single entry.
pub fn for_each_binding<F>(defs: &[IterDef], root: Value, mut f: F) -> Result<(), EvalError>
where
    F: FnMut(&[Value]) -> Result<(), EvalError>,
{
    let mut bound = Vec::with_capacity(defs.len());
    bound.push(root);
    bind_rest(&defs[1.min(defs.len())..], &mut bound, &mut f)
}

fn bind_rest<F>(defs: &[IterDef], bound: &mut Vec<Value>, f: &mut F) -> Result<(), EvalError>
where
    F: FnMut(&[Value]) -> Result<(), EvalError>,
{
    let Some((def, rest)) = defs.split_first() else {
        return f(bound);
    };
    let IterDef::Nested { iter, path } = def else {
        return Err(EvalError::UnboundIterator(bound.len() + 1));
    };
    let parent = iter
        .checked_sub(1)
        .and_then(|i| bound.get(i))
        .ok_or(EvalError::UnboundIterator(*iter))?;
    match path.eval(parent)? {
        Value::List(elems) => {
            for elem in elems {
                bound.push(elem);
                let res = bind_rest(rest, bound, f);
                bound.pop();
                res?;
            }
            Ok(())
        }
        Value::Undefined | Value::Null => Ok(()),
        other => Err(EvalError::NotACollection {
            def: def.to_string(),
            ty: other.type_name(),
        }),
    }
}

/// Evaluates the keys the entry `key -> value` contributes to an index
/// defined over `defs` with the indexed expression `expr`.
///
/// An index over a single definition yields exactly one key.
/// An index enumerating nested collections yields each distinct key once.
pub fn eval_keys(defs: &CanonicalDefs, expr: &PathExpr, key: &Value, value: &Value) -> Result<KeySet, EvalError> {
    let root = match &defs[0] {
        IterDef::Region { view, .. } => view.bind(key, value),
        IterDef::Nested { iter, .. } => return Err(EvalError::UnboundIterator(*iter)),
    };
    let mut keys = KeySet::new();
    for_each_binding(defs, root, |bound| {
        keys.push(expr.eval(bound)?);
        Ok(())
    })?;
    keys.sort_unstable();
    keys.dedup();
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn portfolio(status: &str, positions: &[&str]) -> Value {
        Value::object([
            ("status", status.into()),
            (
                "positions",
                Value::list(positions.iter().map(|sec| Value::object([("secId", Value::from(*sec))]))),
            ),
        ])
    }

    #[test]
    fn single_definition_yields_one_key() {
        let defs = CanonicalDefs::parse(&["/portfolios"]).unwrap();
        let expr = "index_iter1.status".parse().unwrap();
        let keys = eval_keys(&defs, &expr, &1.into(), &portfolio("active", &["IBM"])).unwrap();
        assert_eq!(keys.as_slice(), [Value::from("active")]);

        let keys = eval_keys(&defs, &expr, &1.into(), &Value::object::<&str>([])).unwrap();
        assert_eq!(keys.as_slice(), [Value::Undefined]);
    }

    #[test]
    fn nested_keys_are_distinct() {
        let defs = CanonicalDefs::parse(&["/portfolios", "index_iter1.positions"]).unwrap();
        let expr = "index_iter2.secId".parse().unwrap();
        let keys = eval_keys(&defs, &expr, &1.into(), &portfolio("active", &["SUN", "IBM", "SUN"])).unwrap();
        assert_eq!(keys.as_slice(), [Value::from("IBM"), Value::from("SUN")]);

        // No positions, no keys.
        let keys = eval_keys(&defs, &expr, &1.into(), &portfolio("active", &[])).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn index_over_keys_and_entries() {
        let expr = "index_iter1".parse().unwrap();
        let defs = CanonicalDefs::parse(&["/portfolios.keySet()"]).unwrap();
        let keys = eval_keys(&defs, &expr, &"k1".into(), &portfolio("active", &[])).unwrap();
        assert_eq!(keys.as_slice(), [Value::from("k1")]);

        let defs = CanonicalDefs::parse(&["/portfolios.entrySet()"]).unwrap();
        let expr = "index_iter1.value.status".parse().unwrap();
        let keys = eval_keys(&defs, &expr, &"k1".into(), &portfolio("inactive", &[])).unwrap();
        assert_eq!(keys.as_slice(), [Value::from("inactive")]);
    }

    #[test]
    fn not_a_collection() {
        let defs = CanonicalDefs::parse(&["/portfolios", "index_iter1.status"]).unwrap();
        let expr = "index_iter2".parse().unwrap();
        let err = eval_keys(&defs, &expr, &1.into(), &portfolio("active", &[])).unwrap_err();
        assert_eq!(
            err,
            EvalError::NotACollection {
                def: "index_iter1.status".into(),
                ty: "string"
            }
        );
    }

    #[test]
    fn bindings_enumerate_the_cartesian_product() {
        let defs = CanonicalDefs::parse(&["/r", "index_iter1.a", "index_iter1.b"]).unwrap();
        let root = Value::object([
            ("a", Value::list([1.into(), 2.into()])),
            ("b", Value::list(["x".into(), "y".into(), "z".into()])),
        ]);
        let mut n = 0;
        for_each_binding(&defs, root, |bound| {
            assert_eq!(bound.len(), 3);
            n += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(n, 6);
    }

    proptest! {
        #[test]
        fn nested_keys_are_the_distinct_elements(sec_ids in prop::collection::vec("[A-D]", 0..8)) {
            let defs = CanonicalDefs::parse(&["/portfolios", "index_iter1.positions"]).unwrap();
            let expr = "index_iter2.secId".parse().unwrap();
            let ids: Vec<&str> = sec_ids.iter().map(|s| s.as_str()).collect();
            let keys = eval_keys(&defs, &expr, &1.into(), &portfolio("active", &ids)).unwrap();

            let mut expected: Vec<Value> = ids.iter().map(|s| Value::from(*s)).collect();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(keys.into_vec(), expected);
        }
    }

    #[test]
    fn second_region_cannot_be_bound() {
        let defs = CanonicalDefs::parse(&["/r", "/s"]).unwrap();
        let res = for_each_binding(&defs, Value::Null, |_| Ok(()));
        assert_eq!(res, Err(EvalError::UnboundIterator(2)));
    }
}
