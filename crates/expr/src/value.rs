use enum_as_inner::EnumAsInner;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::fmt;

/// Totally ordered [`f64`] allowing all IEEE-754 floating point values.
pub type F64 = decorum::Total<f64>;

/// The attributes of an object value, ordered by name.
pub type Attrs = BTreeMap<Box<str>, Value>;

/// A value stored in a region entry, or derived from one by evaluating a path.
///
/// Values are totally ordered and hashable so that they can serve as index keys.
/// The derived order ranks variants in declaration order,
/// so `Undefined < Null < Bool < ... < Object`.
#[derive(EnumAsInner, Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub enum Value {
    /// The result of reading an attribute that does not exist.
    #[default]
    Undefined,
    /// An explicit absence of a value.
    Null,
    Bool(bool),
    I64(i64),
    /// A totally ordered [`F64`].
    ///
    /// Unlike the primitive [`f64`], a total order is established,
    /// so NaNs compare equal to each other and can be used as keys.
    F64(F64),
    String(Box<str>),
    /// An ordered collection of values, iterable by nested iteration definitions.
    List(Box<[Value]>),
    /// A set of named attributes.
    Object(Attrs),
}

impl Value {
    /// Returns an object value with the given attributes.
    pub fn object<K: Into<Box<str>>>(attrs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(attrs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Returns a list value with the given elements.
    pub fn list(elems: impl IntoIterator<Item = Value>) -> Self {
        Self::List(elems.into_iter().collect())
    }

    /// Returns whether this value is `Undefined` or `Null`.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Returns the attribute `name` of this value.
    ///
    /// Returns `None` when `self` is not an object.
    /// A missing attribute of an object is `Undefined`.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        static UNDEFINED: Value = Value::Undefined;
        match self {
            Self::Object(attrs) => Some(attrs.get(name).unwrap_or(&UNDEFINED)),
            _ => None,
        }
    }

    /// A short name for the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::I64(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::F64(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value.into_boxed_str())
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value.into_boxed_slice())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("UNDEFINED"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::I64(i) => write!(f, "{i}"),
            Self::F64(x) => write!(f, "{}", f64::from(*x)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(elems) => write!(f, "[{}]", elems.iter().join(", ")),
            Self::Object(attrs) => write!(f, "{{{}}}", attrs.iter().map(|(k, v)| format!("{k}: {v}")).join(", ")),
        }
    }
}
