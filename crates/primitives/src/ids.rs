//! Provides identifiers such as `RegionId`, `IndexId`, and `EntryId`.
use core::fmt;

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct RegionId(pub u32);

#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[repr(transparent)]
pub struct IndexId(pub u32);

macro_rules! system_id {
    ($name:ident) => {
        impl $name {
            pub fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }
        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
        impl From<usize> for $name {
            fn from(value: usize) -> Self {
                Self(value as u32)
            }
        }
        impl From<$name> for usize {
            fn from(value: $name) -> Self {
                value.0 as usize
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
system_id!(RegionId);
system_id!(IndexId);

/// The stable identity of an entry in a region.
///
/// An `EntryId` names a slot in the region's entry arena
/// together with the generation of the slot at the time the entry was created.
/// When an entry is destroyed, its slot is recycled with a bumped generation,
/// so any `EntryId` still held for the destroyed entry no longer resolves.
/// This turns the "entry destroyed concurrently" race into a plain lookup miss.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct EntryId {
    slot: u32,
    generation: u32,
}

impl EntryId {
    pub const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// The arena slot this id refers to.
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// The generation of the slot this id was minted for.
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns the slot as a `usize`, for indexing into the arena.
    pub const fn idx(self) -> usize {
        self.slot as usize
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.slot, self.generation)
    }
}

/// A logical point in time, in milliseconds.
///
/// Used both for the last-modified marker of region entries
/// and for the start time of a query.
/// The values are only ever compared against each other,
/// so the epoch is whatever the clock producing them uses.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
#[repr(transparent)]
pub struct Millis(pub i64);

impl Millis {
    pub const ZERO: Self = Self(0);

    /// Returns `self - earlier` as a signed difference,
    /// widened so that it never overflows.
    pub const fn since(self, earlier: Self) -> i128 {
        self.0 as i128 - earlier.0 as i128
    }
}

impl From<i64> for Millis {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn entry_ids_differ_by_generation() {
        let old = EntryId::new(3, 0);
        let new = EntryId::new(3, 1);
        assert_ne!(old, new);
        assert_eq!(old.slot(), new.slot());
        assert_eq!(new.to_string(), "3@1");
    }

    proptest! {
        #[test]
        fn since_never_overflows(a in any::<i64>(), b in any::<i64>()) {
            let d = Millis(a).since(Millis(b));
            prop_assert_eq!(d, a as i128 - b as i128);
        }
    }
}
