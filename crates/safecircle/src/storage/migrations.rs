//! Forward-only schema migrations.
//!
//! The schema version lives in the `metadata` table. Opening a database
//! applies every step newer than the stored version inside one transaction;
//! a database written by a newer build is refused rather than downgraded.

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::schema::{CREATE_METADATA_TABLE, SCHEMA_STATEMENTS};

/// Schema version produced by this build.
pub const CURRENT_VERSION: i32 = 1;

const VERSION_KEY: &str = "schema_version";

/// One schema step.
struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Steps in ascending version order, ending at [`CURRENT_VERSION`].
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "local storage table",
    statements: SCHEMA_STATEMENTS,
}];

/// Bring `conn` up to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Fails if the stored version is unreadable or newer than this build, or if
/// a migration statement fails. A failed step leaves the database unchanged.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_METADATA_TABLE, [])?;

    let stored = schema_version(conn)?;
    if stored > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {stored} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > stored).collect();
    if pending.is_empty() {
        debug!(version = stored, "Schema up to date");
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for migration in pending {
        debug!(
            version = migration.version,
            description = migration.description,
            "Applying schema migration"
        );
        for statement in migration.statements {
            tx.execute(statement, [])?;
        }
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (VERSION_KEY, migration.version.to_string()),
        )?;
    }
    tx.commit()?;

    info!(from = stored, to = CURRENT_VERSION, "Schema migrated");
    Ok(())
}

/// The stored schema version; 0 when none has been recorded.
///
/// # Errors
///
/// Fails if the metadata table is missing or holds a non-numeric version.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("stored schema version is not a number: {value:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    fn force_version(conn: &Connection, value: &str) {
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (VERSION_KEY, value),
        )
        .unwrap();
    }

    #[test]
    fn test_steps_are_ordered_and_end_at_current() {
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
        assert_eq!(MIGRATIONS.last().map(|m| m.version), Some(CURRENT_VERSION));
    }

    #[test]
    fn test_fresh_database_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();

        assert_eq!(tables(&conn), vec!["local_storage", "metadata"]);
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reopen_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES ('k', 'v', 'now')",
            [],
        )
        .unwrap();

        initialize_schema(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM local_storage", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_unrecorded_version_reads_as_zero() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(CREATE_METADATA_TABLE, []).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        force_version(&conn, &(CURRENT_VERSION + 1).to_string());

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_non_numeric_version_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        initialize_schema(&conn).unwrap();
        force_version(&conn, "abc");

        let err = schema_version(&conn).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }
}
