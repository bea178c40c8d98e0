//! Storage layer for safecircle.
//!
//! This module provides a `SQLite`-backed key/value store with the same
//! shape as browser local storage: string keys mapping to string values.
//! Higher layers (see [`crate::profile`]) serialize their records into it.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

const MEMORY_PATH: &str = ":memory:";

/// Persistent key/value storage.
///
/// The connection sits behind a mutex so a single store can be shared
/// between the SOS controller task and the CLI.
#[derive(Debug)]
pub struct Storage {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open the database at `path`, creating it and its directory if needed,
    /// and migrate it to the current schema.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, the file cannot be opened,
    /// or the schema cannot be migrated.
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

        debug!(path = %path.display(), "Opening local storage");
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!(path = %path.display(), "Local storage ready");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// A throwaway store for tests and dry runs.
    ///
    /// # Errors
    ///
    /// Fails only if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(MEMORY_PATH),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(MEMORY_PATH),
            conn: Mutex::new(conn),
        })
    }

    /// Database file location (`:memory:` for in-memory stores).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("storage connection lock poisoned"))
    }

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Fails if the lookup query fails.
    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Fails if the upsert fails.
    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            r"
            INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            ",
            params![key, value, now],
        )?;
        debug!(key, bytes = value.len(), "Stored item");
        Ok(())
    }

    /// Remove the value stored under `key`.
    ///
    /// Returns `true` if a value was removed.
    ///
    /// # Errors
    ///
    /// Fails if the delete fails.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(affected > 0)
    }

    /// List all stored keys in order.
    ///
    /// # Errors
    ///
    /// Fails on a query error.
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM local_storage ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    /// Count stored items.
    ///
    /// # Errors
    ///
    /// Fails on a query error.
    pub fn count(&self) -> Result<i64> {
        let count: i64 =
            self.conn()?
                .query_row("SELECT COUNT(*) FROM local_storage", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Item count, newest write and file size.
    ///
    /// # Errors
    ///
    /// Fails if either query fails. An unreadable file size reports as 0.
    pub fn stats(&self) -> Result<StorageStats> {
        let total_items = self.count()?;

        let newest: Option<String> = self
            .conn()?
            .query_row(
                "SELECT updated_at FROM local_storage ORDER BY updated_at DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let last_updated = newest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let db_size_bytes = if self.path.as_os_str() == MEMORY_PATH {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_items,
            last_updated,
            db_size_bytes,
        })
    }
}

/// Summary shown by `safecircle status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of stored items.
    pub total_items: i64,
    /// When any item was last written.
    pub last_updated: Option<DateTime<Utc>>,
    /// File size on disk; 0 in memory.
    pub db_size_bytes: u64,
}
