//! `SQLite`-backed [`WebStorage`].

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::migrations;
use super::schema::UPSERT_ENTRY;
use super::WebStorage;

/// A `localStorage`-style string map persisted in `SQLite`.
///
/// Keys are reported in insertion order. Overwriting a key keeps its slot.
#[derive(Debug)]
pub struct SqliteStorage {
    path: PathBuf,
    conn: Connection,
    quota: Option<usize>,
}

impl SqliteStorage {
    /// Open or create a storage database at the given path.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory, database or schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening storage database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Storage database ready at {}", path.display());
        Ok(Self {
            path,
            conn,
            quota: None,
        })
    }

    /// Create a storage that lives only as long as this value.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self {
            path,
            conn,
            quota: None,
        })
    }

    /// Limit the total size of keys and values, in bytes.
    ///
    /// A write that would exceed the quota fails with
    /// [`Error::StorageUnavailable`] and leaves the stored value unchanged.
    #[must_use]
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Path to the database file (`:memory:` for in-memory stores).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes used by every entry except `key`.
    fn used_excluding(&self, key: &str) -> Result<usize> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
             FROM entries WHERE key != ?1",
            [key],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(used).unwrap_or(usize::MAX))
    }
}

impl WebStorage for SqliteStorage {
    fn length(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn key(&self, index: usize) -> Result<Option<String>> {
        let Ok(offset) = i64::try_from(index) else {
            return Ok(None);
        };
        let key = self
            .conn
            .query_row(
                "SELECT key FROM entries ORDER BY position LIMIT 1 OFFSET ?1",
                [offset],
                |row| row.get(0),
            )
            .optional()?;
        Ok(key)
    }

    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM entries WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if let Some(quota) = self.quota {
            let needed = self.used_excluding(key)? + key.len() + value.len();
            if needed > quota {
                return Err(Error::storage_unavailable(format!(
                    "quota exceeded: {needed} of {quota} bytes"
                )));
            }
        }
        self.conn.execute(UPSERT_ENTRY, params![key, value])?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM entries WHERE key = ?1", [key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM entries", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().expect("failed to create in-memory storage")
    }

    #[test]
    fn test_set_get_remove() {
        let storage = create_test_storage();
        assert_eq!(storage.get_item("a").unwrap(), None);

        storage.set_item("a", "1").unwrap();
        assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.length().unwrap(), 1);

        storage.remove_item("a").unwrap();
        storage.remove_item("a").unwrap();
        assert_eq!(storage.length().unwrap(), 0);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let storage = create_test_storage();
        storage.set_item("first", "1").unwrap();
        storage.set_item("second", "2").unwrap();
        storage.set_item("first", "one").unwrap();

        assert_eq!(storage.key(0).unwrap().as_deref(), Some("first"));
        assert_eq!(storage.key(1).unwrap().as_deref(), Some("second"));
        assert_eq!(storage.key(2).unwrap(), None);
        assert_eq!(storage.get_item("first").unwrap().as_deref(), Some("one"));
    }

    #[test]
    fn test_clear() {
        let storage = create_test_storage();
        storage.set_item("a", "1").unwrap();
        storage.set_item("b", "2").unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.length().unwrap(), 0);
    }

    #[test]
    fn test_quota_rejects_oversized_write() {
        let storage = create_test_storage().with_quota(10);
        storage.set_item("k", "12345").unwrap();

        let err = storage.set_item("other", "123456789").unwrap_err();
        assert!(matches!(err, Error::StorageUnavailable(_)));
        assert_eq!(storage.get_item("other").unwrap(), None);

        // Replacing a value only counts the new size.
        storage.set_item("k", "123456789").unwrap();
    }

    #[test]
    fn test_open_creates_directories_and_persists() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("local.db");

        {
            let storage = SqliteStorage::open(&db_path).unwrap();
            storage.set_item("visitor", "abc").unwrap();
            assert_eq!(storage.path(), db_path.as_path());
        }

        let reopened = SqliteStorage::open(&db_path).unwrap();
        assert_eq!(reopened.get_item("visitor").unwrap().as_deref(), Some("abc"));
    }
}
