//! The canonical form of iteration definitions and path expressions.
//!
//! Iterators are named positionally, `index_iter1` being the first,
//! so that two definitions compare equal regardless of the aliases a user chose.

use crate::errors::{EvalError, ParseError};
use crate::value::Value;
use derive_more::Deref;
use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// The prefix of a positional iterator name.
pub const ITER_PREFIX: &str = "index_iter";

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_') && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// A sequence of attribute names, read one after the other.
///
/// The empty path denotes the value it is applied to.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deref)]
pub struct AttrPath(SmallVec<[Box<str>; 2]>);

impl AttrPath {
    pub fn new<S: Into<Box<str>>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parses a `.`-separated path such as `position.secId`.
    /// The empty string parses to the empty path.
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        s.split('.')
            .map(|seg| is_ident(seg).then(|| seg.into()).ok_or_else(|| ParseError::malformed_path(s)))
            .collect::<Result<_, _>>()
            .map(Self)
    }

    /// Reads this path starting at `root`.
    ///
    /// Reading through `Undefined` or `Null` yields `Undefined`,
    /// as does reading a missing attribute.
    pub fn eval(&self, root: &Value) -> Result<Value, EvalError> {
        let mut cur = root;
        for seg in self.iter() {
            if cur.is_absent() {
                return Ok(Value::Undefined);
            }
            cur = cur.attr(seg).ok_or_else(|| EvalError::not_an_object(seg, cur.type_name()))?;
        }
        Ok(cur.clone())
    }
}

impl fmt::Display for AttrPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iter().join("."))
    }
}

/// Which part of a region's entries a region iterator binds to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionView {
    /// `/r` or `/r.values()`
    #[default]
    Values,
    /// `/r.keySet()`
    Keys,
    /// `/r.entrySet()`, binding objects with a `key` and a `value` attribute.
    Entries,
}

impl RegionView {
    fn suffix(self) -> &'static str {
        match self {
            Self::Values => "",
            Self::Keys => ".keySet()",
            Self::Entries => ".entrySet()",
        }
    }

    /// Returns the value a region iterator with this view binds to for the given entry.
    pub fn bind(self, key: &Value, value: &Value) -> Value {
        match self {
            Self::Values => value.clone(),
            Self::Keys => key.clone(),
            Self::Entries => Value::object([("key", key.clone()), ("value", value.clone())]),
        }
    }
}

/// Splits `index_iter<k>[.<rest>]` into `k` and `rest`.
fn split_iter_ref(s: &str) -> Option<(usize, &str)> {
    let s = s.strip_prefix(ITER_PREFIX)?;
    let (num, rest) = match s.split_once('.') {
        Some((num, rest)) => (num, rest),
        None => (s, ""),
    };
    let k = num.parse::<usize>().ok().filter(|k| *k >= 1 && !num.starts_with('+'))?;
    Some((k, rest))
}

/// One iteration definition in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IterDef {
    /// Iterates the entries of the region at `path`.
    Region { path: Box<str>, view: RegionView },
    /// Iterates the collection found at `path` under an earlier iterator.
    /// `iter` is 1-based.
    Nested { iter: usize, path: AttrPath },
}

impl IterDef {
    pub fn region(path: &str) -> Self {
        Self::Region {
            path: path.into(),
            view: RegionView::Values,
        }
    }

    pub fn nested(iter: usize, path: AttrPath) -> Self {
        Self::Nested { iter, path }
    }

    /// Returns the iterator this definition depends on, if any.
    pub fn depends_on(&self) -> Option<usize> {
        match self {
            Self::Region { .. } => None,
            Self::Nested { iter, .. } => Some(*iter),
        }
    }

    pub fn region_path(&self) -> Option<&str> {
        match self {
            Self::Region { path, .. } => Some(path),
            Self::Nested { .. } => None,
        }
    }

    /// Returns this definition with its iterator reference replaced by `iter`.
    pub fn with_iter(&self, iter: usize) -> Self {
        match self {
            Self::Region { .. } => self.clone(),
            Self::Nested { path, .. } => Self::Nested {
                iter,
                path: path.clone(),
            },
        }
    }
}

impl fmt::Display for IterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Region { path, view } => write!(f, "{path}{}", view.suffix()),
            Self::Nested { iter, path } => write!(f, "{ITER_PREFIX}{iter}.{path}"),
        }
    }
}

impl FromStr for IterDef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('/') {
            let (path, view) = [
                (".keySet()", RegionView::Keys),
                (".entrySet()", RegionView::Entries),
                (".values()", RegionView::Values),
            ]
            .into_iter()
            .find_map(|(suffix, view)| s.strip_suffix(suffix).map(|p| (p, view)))
            .unwrap_or((s, RegionView::Values));
            let well_formed = path[1..]
                .split('/')
                .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-'));
            return well_formed
                .then(|| Self::Region { path: path.into(), view })
                .ok_or_else(|| ParseError::malformed_def(s));
        }
        match split_iter_ref(s) {
            Some((iter, rest)) if !rest.is_empty() => Ok(Self::Nested {
                iter,
                path: AttrPath::parse(rest).map_err(|_| ParseError::malformed_def(s))?,
            }),
            _ => Err(ParseError::malformed_def(s)),
        }
    }
}

/// A path evaluated against one iterator, e.g., `index_iter2.secId`.
///
/// This is the compiled form of an index's indexed expression
/// and of the target path of a query predicate.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathExpr {
    /// 1-based.
    pub iter: usize,
    pub path: AttrPath,
}

impl PathExpr {
    pub fn new(iter: usize, path: AttrPath) -> Self {
        Self { iter, path }
    }

    pub fn with_iter(&self, iter: usize) -> Self {
        Self::new(iter, self.path.clone())
    }

    /// Evaluates this path given the values bound to each iterator, in order.
    pub fn eval(&self, bound: &[Value]) -> Result<Value, EvalError> {
        let root = self
            .iter
            .checked_sub(1)
            .and_then(|i| bound.get(i))
            .ok_or(EvalError::UnboundIterator(self.iter))?;
        self.path.eval(root)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{ITER_PREFIX}{}", self.iter)?;
        if !self.path.is_empty() {
            write!(f, ".{}", self.path)?;
        }
        Ok(())
    }
}

impl FromStr for PathExpr {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (iter, rest) = split_iter_ref(s).ok_or_else(|| ParseError::malformed_path(s))?;
        let path = AttrPath::parse(rest).map_err(|_| ParseError::malformed_path(s))?;
        Ok(Self { iter, path })
    }
}

/// An ordered, validated sequence of iteration definitions.
///
/// The first definition names a region.
/// Every nested definition refers to an iterator defined before it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deref)]
pub struct CanonicalDefs(SmallVec<[IterDef; 4]>);

impl CanonicalDefs {
    pub fn new(defs: impl IntoIterator<Item = IterDef>) -> Result<Self, ParseError> {
        let defs: SmallVec<[IterDef; 4]> = defs.into_iter().collect();
        match defs.first() {
            None => return Err(ParseError::Empty),
            Some(first @ IterDef::Nested { .. }) => return Err(ParseError::LeadingNotRegion(first.to_string())),
            Some(IterDef::Region { .. }) => {}
        }
        for (pos, def) in defs.iter().enumerate() {
            if let Some(iter) = def.depends_on()
                && (iter == 0 || iter > pos)
            {
                return Err(ParseError::ForwardReference { pos: pos + 1, iter });
            }
        }
        Ok(Self(defs))
    }

    /// Parses and validates definitions in their canonical string form.
    pub fn parse<S: AsRef<str>>(defs: &[S]) -> Result<Self, ParseError> {
        Self::new(defs.iter().map(|s| s.as_ref().parse()).collect::<Result<Vec<IterDef>, _>>()?)
    }

    /// The path of the leading region.
    pub fn region_path(&self) -> &str {
        self.0[0].region_path().unwrap_or_default()
    }

    /// The number of definitions that name a region.
    pub fn num_regions(&self) -> usize {
        self.iter().filter(|def| def.region_path().is_some()).count()
    }

    /// Returns the canonical string of each definition.
    pub fn to_strings(&self) -> Vec<String> {
        self.iter().map(|def| def.to_string()).collect()
    }
}

impl fmt::Display for CanonicalDefs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.iter().join(", "))
    }
}
