//! Storage layer for autocapture.
//!
//! [`WebStorage`] is the browser `Storage` contract. [`SqliteStorage`] backs
//! `localStorage`/`sessionStorage` and [`MemoryStore`] is the in-memory map.
//! [`Persistence`] selects one of them behind a uniform interface and owns the
//! captured event history.

pub mod memory;
pub mod migrations;
pub mod persistence;
pub mod schema;
pub mod sqlite;

use std::fmt;

use crate::error::Result;

pub use memory::{decode_json, MemoryStore};
pub use persistence::{Persistence, PersistenceKind, STORAGE_KEY, VISITOR_ID_KEY};
pub use sqlite::SqliteStorage;

/// A string-to-string store with the semantics of the browser `Storage` API.
///
/// Reads of a missing key return `Ok(None)`; removing a missing key succeeds.
pub trait WebStorage: fmt::Debug {
    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn length(&self) -> Result<usize>;

    /// Key at `index` in storage order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn key(&self, index: usize) -> Result<Option<String>>;

    /// Value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected (e.g. quota) or fails.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Remove every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear(&self) -> Result<()>;
}
