//! The canonical definition model.
//!
//! Iteration definitions, path expressions and the values they are evaluated against,
//! together with the evaluation of index keys for a single region entry.

pub mod canonical;
pub mod errors;
pub mod eval;
pub mod from_clause;
pub mod value;

pub use canonical::{AttrPath, CanonicalDefs, IterDef, PathExpr, RegionView};
pub use errors::{EvalError, ParseError};
pub use eval::{KeySet, eval_keys, for_each_binding};
pub use from_clause::FromClause;
pub use value::{F64, Value};
