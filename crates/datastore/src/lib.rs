//! The index catalog and index maintenance of regiondb.
//!
//! A [`Cache`](cache::Cache) owns regions.
//! Each region has an [`IndexManager`](catalog::IndexManager)
//! that creates and removes its [`Index`](index::Index)es
//! and keeps them up to date as entries change.

pub mod arbiter;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;

use error::DatastoreError;

pub type Result<T> = core::result::Result<T, DatastoreError>;
