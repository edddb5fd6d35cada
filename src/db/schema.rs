// src/db/schema.rs

//! Registry schema and migrations
//!
//! Versioned like every SQLite store here: a `schema_version` table records
//! applied migrations and `migrate` brings an older file up to date.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Apply all pending migrations
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    debug!("Current registry schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying registry migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::RuntimeError(format!(
            "Unknown registry migration version: {version}"
        ))),
    }
}

/// Initial schema
///
/// - features: installed feature descriptors
/// - fixes: installed fix descriptors
/// - installed_files: files written by each feature or fix
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE features (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbolic_name TEXT NOT NULL UNIQUE,
            short_name TEXT,
            visibility TEXT NOT NULL CHECK(visibility IN ('public', 'install', 'protected', 'private')),
            auto_feature INTEGER NOT NULL DEFAULT 0,
            install_policy TEXT NOT NULL,
            descriptor TEXT NOT NULL,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_features_short_name ON features(short_name COLLATE NOCASE);

        CREATE TABLE fixes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            fix_id TEXT NOT NULL UNIQUE,
            descriptor TEXT NOT NULL,
            installed_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE installed_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_kind TEXT NOT NULL CHECK(owner_kind IN ('feature', 'fix')),
            owner_id TEXT NOT NULL,
            path TEXT NOT NULL,
            UNIQUE(owner_kind, owner_id, path)
        );

        CREATE INDEX idx_installed_files_owner ON installed_files(owner_kind, owner_id);
        ",
    )?;

    debug!("Registry schema version 1 created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_migrate_creates_tables() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('features', 'fixes', 'installed_files')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let (_temp, conn) = create_test_db();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
