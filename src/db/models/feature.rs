// src/db/models/feature.rs

//! Installed features
//!
//! The full descriptor is kept as JSON next to the columns used for lookups,
//! so the resolver and the uninstall orderer can work from the registry alone.

use crate::descriptor::{FeatureDescriptor, InstallPolicy, Visibility};
use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct InstalledFeature {
    pub id: Option<i64>,
    pub symbolic_name: String,
    pub short_name: Option<String>,
    pub visibility: Visibility,
    pub auto_feature: bool,
    pub install_policy: InstallPolicy,
    pub descriptor: String,
    pub installed_at: Option<String>,
}

impl InstalledFeature {
    pub fn from_descriptor(descriptor: &FeatureDescriptor) -> Result<Self> {
        Ok(Self {
            id: None,
            symbolic_name: descriptor.symbolic_name().to_string(),
            short_name: descriptor.short_name().map(str::to_string),
            visibility: descriptor.visibility(),
            auto_feature: descriptor.is_auto_feature(),
            install_policy: descriptor.install_policy(),
            descriptor: serde_json::to_string(descriptor)?,
            installed_at: None,
        })
    }

    pub fn descriptor(&self) -> Result<FeatureDescriptor> {
        serde_json::from_str(&self.descriptor).map_err(|e| {
            Error::RuntimeError(format!(
                "Corrupt registry entry for {}: {e}",
                self.symbolic_name
            ))
        })
    }

    /// Insert, replacing any previous record of the same feature
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT OR REPLACE INTO features
                (symbolic_name, short_name, visibility, auto_feature, install_policy, descriptor)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.symbolic_name,
                &self.short_name,
                self.visibility.as_str(),
                self.auto_feature,
                self.install_policy.as_str(),
                &self.descriptor,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find by symbolic name, or by short name ignoring case
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, symbolic_name, short_name, visibility, auto_feature, install_policy,
                    descriptor, installed_at
             FROM features
             WHERE symbolic_name = ?1 OR short_name = ?1 COLLATE NOCASE
             ORDER BY symbolic_name = ?1 DESC
             LIMIT 1",
        )?;

        let feature = stmt.query_row([name], Self::from_row).optional()?;
        Ok(feature)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, symbolic_name, short_name, visibility, auto_feature, install_policy,
                    descriptor, installed_at
             FROM features ORDER BY symbolic_name",
        )?;

        let features = stmt
            .query_map([], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(features)
    }

    /// Every installed descriptor, ready for the resolver and uninstall planner
    pub fn list_descriptors(conn: &Connection) -> Result<Vec<Arc<FeatureDescriptor>>> {
        Self::list_all(conn)?
            .iter()
            .map(|f| f.descriptor().map(Arc::new))
            .collect()
    }

    pub fn delete(conn: &Connection, symbolic_name: &str) -> Result<bool> {
        let rows = conn.execute(
            "DELETE FROM features WHERE symbolic_name = ?1",
            [symbolic_name],
        )?;
        Ok(rows > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let visibility: String = row.get(3)?;
        let policy: String = row.get(5)?;
        Ok(Self {
            id: Some(row.get(0)?),
            symbolic_name: row.get(1)?,
            short_name: row.get(2)?,
            visibility: visibility.parse().unwrap_or(Visibility::Public),
            auto_feature: row.get(4)?,
            install_policy: policy.parse().unwrap_or(InstallPolicy::Always),
            descriptor: row.get(6)?,
            installed_at: row.get(7)?,
        })
    }
}
