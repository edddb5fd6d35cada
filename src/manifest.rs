// src/manifest.rs

//! Manifest reader seam
//!
//! The core never looks inside an archive itself; it asks a [`ManifestReader`]
//! for the descriptor. [`TomlManifestReader`] understands the plain TOML
//! header format used by directory repositories and by the test fixtures:
//!
//! ```toml
//! manifest-version = 1
//! kind = "feature"
//! symbolic-name = "com.example.jdbc-4.2"
//! short-name = "jdbc-4.2"
//! visibility = "public"
//!
//! [[constituents]]
//! name = "com.example.jdbc-base"
//! ```

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Only manifest version understood by [`TomlManifestReader`]
pub const MANIFEST_VERSION: i64 = 1;

/// Produces a descriptor from an archive on disk
pub trait ManifestReader {
    /// Parse the archive at `path`
    ///
    /// Unreadable, unparsable, or unsupported manifests return
    /// [`Error::BadFeatureDefinition`].
    fn parse(&self, path: &Path) -> Result<Descriptor>;
}

impl<T: ManifestReader + ?Sized> ManifestReader for &T {
    fn parse(&self, path: &Path) -> Result<Descriptor> {
        (**self).parse(path)
    }
}

/// Reads TOML descriptor headers
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlManifestReader;

impl TomlManifestReader {
    pub fn new() -> Self {
        Self
    }

    /// Parse descriptor text; `origin` is only used for error messages
    pub fn parse_str(&self, content: &str, origin: &Path) -> Result<Descriptor> {
        let bad = |reason: String| Error::BadFeatureDefinition {
            path: origin.to_path_buf(),
            reason,
        };

        let mut table: toml::Table = content.parse().map_err(|e: toml::de::Error| bad(e.to_string()))?;

        let version = table
            .remove("manifest-version")
            .ok_or_else(|| bad("missing manifest-version".to_string()))?;
        match version.as_integer() {
            Some(MANIFEST_VERSION) => {}
            Some(other) => return Err(bad(format!("unsupported manifest version {other}"))),
            None => return Err(bad("manifest-version must be an integer".to_string())),
        }

        // Payload sections belong to the extraction engine
        table.remove("files");

        let descriptor: Descriptor = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| bad(e.to_string()))?;

        if descriptor.id().trim().is_empty() {
            return Err(bad("empty identifier".to_string()));
        }

        debug!("Parsed manifest {} from {}", descriptor.id(), origin.display());
        Ok(descriptor)
    }
}

impl ManifestReader for TomlManifestReader {
    fn parse(&self, path: &Path) -> Result<Descriptor> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::BadFeatureDefinition {
            path: path.to_path_buf(),
            reason: format!("cannot read manifest: {e}"),
        })?;
        self.parse_str(&content, path)
    }
}
