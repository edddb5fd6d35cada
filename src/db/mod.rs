// src/db/mod.rs

//! Installed-state registry
//!
//! A single SQLite file records which features and fixes are installed and
//! which files each of them wrote.

pub mod models;
pub mod schema;

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::debug;

/// Open (creating if needed) and migrate the registry at `path`
pub fn open(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL;")?;
    schema::migrate(&conn)?;
    debug!("Opened registry {}", path.display());
    Ok(conn)
}

/// In-memory registry, used when no install root is configured
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    schema::migrate(&conn)?;
    Ok(conn)
}

/// Run `f` inside a transaction, committing only if it succeeds
pub fn transaction<F, T>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction<'_>) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_and_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lib/versions/installed.db");
        let conn = open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(schema::get_schema_version(&conn).unwrap(), schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();
        let result: Result<()> = transaction(&mut conn, |tx| {
            tx.execute(
                "INSERT INTO fixes (fix_id, descriptor) VALUES ('f1', '{}')",
                [],
            )?;
            Err(crate::error::Error::RuntimeError("boom".to_string()))
        });
        assert!(result.is_err());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM fixes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
