#![cfg_attr(not(test), no_std)]

mod ids;
mod kind;

pub use ids::{EntryId, IndexId, Millis, RegionId};
pub use kind::{IndexKind, RemovalKind};
