use regiondb_expr::{IterDef, Value, for_each_binding};
use regiondb_physical_plan::plan::Select;

/// Returns whether some binding of the query's iterators to the entry `key -> value`
/// satisfies the query's predicate.
///
/// An entry the predicate cannot be evaluated against does not match,
/// just as it is absent from every index.
pub fn matches(select: &Select, key: &Value, value: &Value) -> bool {
    let root = match &select.defs[0] {
        IterDef::Region { view, .. } => view.bind(key, value),
        IterDef::Nested { .. } => return false,
    };
    let mut found = false;
    let res = for_each_binding(&select.defs, root, |bound| {
        let value = select.target.eval(bound)?;
        found |= select.sarg.eval(&value);
        Ok(())
    });
    match res {
        Ok(()) => found,
        Err(err) => {
            log::debug!("cannot evaluate {} for key {key}: {err}", select.target);
            false
        }
    }
}
