// src/db/models/file.rs

//! Files written per feature or fix, used for uninstall and rollback

use crate::error::{Error, Result};
use rusqlite::{Connection, params};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    Feature,
    Fix,
}

impl OwnerKind {
    pub fn as_str(&self) -> &str {
        match self {
            OwnerKind::Feature => "feature",
            OwnerKind::Fix => "fix",
        }
    }
}

impl FromStr for OwnerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "feature" => Ok(OwnerKind::Feature),
            "fix" => Ok(OwnerKind::Fix),
            _ => Err(Error::RuntimeError(format!("Unknown owner kind: {s}"))),
        }
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledFile {
    pub owner_kind: OwnerKind,
    pub owner_id: String,
    pub path: PathBuf,
}

impl InstalledFile {
    /// Record `paths` for one owner; duplicates are ignored
    pub fn insert_many(
        conn: &Connection,
        owner_kind: OwnerKind,
        owner_id: &str,
        paths: &[PathBuf],
    ) -> Result<usize> {
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO installed_files (owner_kind, owner_id, path) VALUES (?1, ?2, ?3)",
        )?;
        let mut inserted = 0;
        for path in paths {
            inserted += stmt.execute(params![
                owner_kind.as_str(),
                owner_id,
                path.to_string_lossy()
            ])?;
        }
        Ok(inserted)
    }

    pub fn files_for(conn: &Connection, owner_kind: OwnerKind, owner_id: &str) -> Result<Vec<PathBuf>> {
        let mut stmt = conn.prepare(
            "SELECT path FROM installed_files WHERE owner_kind = ?1 AND owner_id = ?2 ORDER BY id",
        )?;
        let paths = stmt
            .query_map(params![owner_kind.as_str(), owner_id], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths.into_iter().map(PathBuf::from).collect())
    }

    /// Owners other than the given one that also recorded `path`
    pub fn other_owners(
        conn: &Connection,
        path: &Path,
        owner_kind: OwnerKind,
        owner_id: &str,
    ) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM installed_files
             WHERE path = ?1 AND NOT (owner_kind = ?2 AND owner_id = ?3)",
            params![path.to_string_lossy(), owner_kind.as_str(), owner_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn delete_for(conn: &Connection, owner_kind: OwnerKind, owner_id: &str) -> Result<usize> {
        let rows = conn.execute(
            "DELETE FROM installed_files WHERE owner_kind = ?1 AND owner_id = ?2",
            params![owner_kind.as_str(), owner_id],
        )?;
        Ok(rows)
    }
}
