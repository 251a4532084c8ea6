use core::fmt;
use enum_as_inner::EnumAsInner;

/// The kind of a secondary index.
///
/// All kinds share the catalog and maintenance contracts.
/// They differ in how keys are stored and which lookups they support.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, EnumAsInner)]
pub enum IndexKind {
    /// A general index over an attribute path,
    /// possibly enumerating nested collections.
    /// Keys are stored ordered.
    Functional,
    /// Like [`IndexKind::Functional`], named for indexes created for range predicates.
    Range,
    /// An ordered index over exactly one region iterator.
    ///
    /// Each entry contributes exactly one key.
    CompactRange,
    /// A hashed index.
    ///
    /// Supports point lookups only.
    Hash,
}

impl IndexKind {
    /// Returns whether keys of this kind are stored ordered,
    /// i.e., whether the index supports range scans.
    pub const fn is_ordered(self) -> bool {
        !matches!(self, Self::Hash)
    }

    /// Returns whether an index of this kind may enumerate nested collections.
    pub const fn allows_nested_iterators(self) -> bool {
        !matches!(self, Self::CompactRange)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Functional => "functional",
            Self::Range => "range",
            Self::CompactRange => "compact-range",
            Self::Hash => "hash",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why an entry's mappings are being removed from an index.
///
/// This only affects statistics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RemovalKind {
    /// The entry was destroyed.
    Destroy,
    /// The entry's value was invalidated.
    Invalidate,
    /// The removal is a side effect of some other operation,
    /// e.g., an update whose keys could not be evaluated.
    Other,
}

impl RemovalKind {
    /// Returns whether the removal counts as an update of the index.
    pub const fn counts_as_update(self) -> bool {
        !matches!(self, Self::Other)
    }
}
