// src/checksums.rs

//! Per-installation checksum manifest and runtime fingerprint
//!
//! Both are read before a transaction and rewritten once after it commits.
//! The manifest maps install-root-relative paths to SHA-256 digests; the
//! fingerprint is a SHA-256 over the sorted manifest and the installed
//! feature names, so any change to either produces a new value.

use crate::error::{Error, Result};
use crate::hash::{self, HashAlgorithm, Hasher};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumManifest {
    files: BTreeMap<String, String>,
}

impl ChecksumManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the manifest; a missing file is an empty manifest
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No checksum manifest at {}", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            Error::IoError(format!("Corrupt checksum manifest {}: {e}", path.display()))
        })
    }

    /// Write atomically (temp file + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        debug!("Saved {} checksums to {}", self.files.len(), path.display());
        Ok(())
    }

    pub fn get(&self, relative: &str) -> Option<&str> {
        self.files.get(relative).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Record current digests of `files` (absolute paths under `root`)
    ///
    /// Paths that no longer exist are dropped from the manifest.
    pub fn update(&mut self, root: &Path, files: &[PathBuf]) -> Result<()> {
        for file in files {
            let Some(key) = relative_key(root, file) else {
                warn!("{} is outside {}, not tracked", file.display(), root.display());
                continue;
            };
            if file.is_file() {
                let digest = hash::hash_file(HashAlgorithm::Sha256, file)?;
                self.files.insert(key, digest);
            } else {
                self.files.remove(&key);
            }
        }
        Ok(())
    }

    /// Files whose on-disk digest no longer matches
    pub fn modified(&self, root: &Path) -> Vec<String> {
        self.files
            .iter()
            .filter(|(key, expected)| {
                let path = root.join(key);
                match hash::hash_file(HashAlgorithm::Sha256, &path) {
                    Ok(actual) => !hash::digests_equal(expected, &actual),
                    Err(_) => true,
                }
            })
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// SHA-256 over the sorted entries and the sorted feature names
    pub fn fingerprint<'a, I>(&self, features: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Hasher::new(HashAlgorithm::Sha256);
        for (path, digest) in &self.files {
            hasher.update(path.as_bytes());
            hasher.update(b"\0");
            hasher.update(digest.as_bytes());
            hasher.update(b"\n");
        }
        let mut names: Vec<&str> = features.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        for name in names {
            hasher.update(b"feature:");
            hasher.update(name.as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize()
    }
}

fn relative_key(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    Some(
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

pub fn write_fingerprint(path: &Path, fingerprint: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{fingerprint}\n"))?;
    info!("Runtime fingerprint updated: {}", fingerprint);
    Ok(())
}

pub fn read_fingerprint(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(std::fs::read_to_string(path)?.trim().to_string()))
}
