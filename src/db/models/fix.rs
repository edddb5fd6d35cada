// src/db/models/fix.rs

use crate::descriptor::FixDescriptor;
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::sync::Arc;

/// An installed fix
#[derive(Debug, Clone)]
pub struct InstalledFix {
    pub id: Option<i64>,
    pub fix_id: String,
    pub descriptor: String,
    pub installed_at: Option<String>,
}

impl InstalledFix {
    pub fn from_descriptor(descriptor: &FixDescriptor) -> Result<Self> {
        Ok(Self {
            id: None,
            fix_id: descriptor.id().to_string(),
            descriptor: serde_json::to_string(descriptor)?,
            installed_at: None,
        })
    }

    pub fn descriptor(&self) -> Result<FixDescriptor> {
        serde_json::from_str(&self.descriptor)
            .map_err(|e| Error::RuntimeError(format!("Corrupt registry entry for fix {}: {e}", self.fix_id)))
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT OR REPLACE INTO fixes (fix_id, descriptor) VALUES (?1, ?2)",
            params![&self.fix_id, &self.descriptor],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    pub fn find_by_id(conn: &Connection, fix_id: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, fix_id, descriptor, installed_at FROM fixes WHERE fix_id = ?1",
        )?;
        let fix = stmt.query_row([fix_id], Self::from_row).optional()?;
        Ok(fix)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt =
            conn.prepare("SELECT id, fix_id, descriptor, installed_at FROM fixes ORDER BY id")?;
        let fixes = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(fixes)
    }

    /// Installed fixes in installation order
    pub fn list_descriptors(conn: &Connection) -> Result<Vec<Arc<FixDescriptor>>> {
        Self::list_all(conn)?
            .iter()
            .map(|f| f.descriptor().map(Arc::new))
            .collect()
    }

    pub fn delete(conn: &Connection, fix_id: &str) -> Result<bool> {
        let rows = conn.execute("DELETE FROM fixes WHERE fix_id = ?1", [fix_id])?;
        Ok(rows > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            fix_id: row.get(1)?,
            descriptor: row.get(2)?,
            installed_at: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn test_fix_roundtrip_keeps_problems_and_files() {
        let conn = db::open_in_memory().unwrap();
        let fix = FixDescriptor::new("PH1")
            .with_problems(["P1", "P2"])
            .with_files(["lib/a.jar"]);
        InstalledFix::from_descriptor(&fix).unwrap().insert(&conn).unwrap();

        let stored = InstalledFix::find_by_id(&conn, "PH1").unwrap().unwrap();
        let restored = stored.descriptor().unwrap();
        assert_eq!(restored.problem_ids().len(), 2);
        assert!(restored.file_ids().contains("lib/a.jar"));

        assert!(InstalledFix::delete(&conn, "PH1").unwrap());
        assert!(InstalledFix::find_by_id(&conn, "PH1").unwrap().is_none());
    }
}
