// src/error.rs

//! Error types for the provisioning core
//!
//! One enum covers every failure the resolver, acquisition pipeline and
//! transaction orchestrator can surface. Each variant carries enough context
//! (asset id, blocking dependents, required vs. available space) for the
//! caller to print an actionable message.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by resolution, acquisition, install and uninstall
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed request (unknown name, empty id list, bad option combination)
    #[error("Invalid request: {0}")]
    BadArgument(String),

    /// Nothing to do: every requested asset is already installed
    #[error("Already installed: {0}")]
    AlreadyExists(String),

    /// An expected local artifact is absent
    #[error("Feature '{name}' could not be found in {}", .directory.display())]
    MissingContent { name: String, directory: PathBuf },

    /// Unparsable or unsupported manifest
    #[error("Invalid feature definition in {}: {reason}", .path.display())]
    BadFeatureDefinition { path: PathBuf, reason: String },

    /// Product-applicability mismatch
    #[error("Feature '{name}' is not valid for this product: {reason}")]
    NotValidForProduct { name: String, reason: String },

    /// Generic I/O failure with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Raw I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Download destination could not be created or written
    #[error("Cannot write {} while downloading {source_url}: {reason}", .destination.display())]
    CannotWrite {
        source_url: String,
        destination: PathBuf,
        reason: String,
    },

    /// Transport-level download failure
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Recomputed digest differs from the advertised one
    #[error("Checksum mismatch for {asset}: {algorithm} expected {expected}, got {actual}")]
    ChecksumMismatch {
        asset: String,
        algorithm: String,
        expected: String,
        actual: String,
    },

    /// Signature verification could not establish trust
    #[error("Signature verification failed: {0}")]
    SignatureUnverified(String),

    /// A public key failed validation (id mismatch, revoked, expired)
    #[error("Public key {key_id} is not valid: {reason}")]
    InvalidKey { key_id: String, reason: String },

    /// Uninstall blocked by a surviving dependent
    #[error("Feature '{feature}' cannot be removed, it is required by: {}", .blockers.join(", "))]
    DependencyBlocked {
        feature: String,
        blockers: Vec<String>,
    },

    /// Fix removal would break a non-superseding fix that touches the same files
    #[error("Fix '{fix}' cannot be removed, fix '{conflicting}' updates the same files")]
    FixConflict { fix: String, conflicting: String },

    /// Target file is held by another process
    #[error("File is locked: {}", .0.display())]
    FileLocked(PathBuf),

    /// Disk-space preflight failed
    #[error("Not enough space in {}: {required} required, {available} available", .path.display())]
    InsufficientSpace {
        path: PathBuf,
        required: String,
        available: String,
    },

    /// Cooperative cancellation requested by a listener or cancel token
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Registry database failure
    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Catch-all
    #[error("{0}")]
    RuntimeError(String),
}

impl Error {
    /// True when the error represents a cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }

    /// Wrap an error raised by the external extraction engine
    pub fn wrap_extraction(asset: &str, err: impl std::fmt::Display) -> Self {
        Error::IoError(format!("Failed to install {asset}: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::RuntimeError(format!("JSON error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_message_lists_blockers() {
        let err = Error::DependencyBlocked {
            feature: "jdbc-4.2".to_string(),
            blockers: vec!["webProfile-8.0".to_string(), "jpa-2.2".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Feature 'jdbc-4.2' cannot be removed, it is required by: webProfile-8.0, jpa-2.2"
        );
    }

    #[test]
    fn test_cancellation_is_distinct() {
        assert!(Error::Cancelled("install".to_string()).is_cancellation());
        assert!(!Error::IoError("disk".to_string()).is_cancellation());
    }
}
