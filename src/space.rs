// src/space.rs

//! Disk-space preflight
//!
//! Runs before anything in a transaction is downloaded: the sum of all
//! resolved artifact sizes must fit in the free space of the install target.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;

/// Printable size: "N MB" from one megabyte up, "N KB" below (rounded up)
pub fn format_size(bytes: u64) -> String {
    if bytes >= MB {
        format!("{} MB", bytes.div_ceil(MB))
    } else {
        format!("{} KB", bytes.div_ceil(KB))
    }
}

/// Nearest existing ancestor, so free space can be queried before the
/// install directories exist
fn existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path.to_path_buf();
    while !current.exists() {
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent.to_path_buf(),
            _ => return PathBuf::from("."),
        }
    }
    current
}

pub fn available_space(path: &Path) -> Result<u64> {
    let probe = existing_ancestor(path);
    fs2::available_space(&probe)
        .map_err(|e| Error::IoError(format!("Cannot query free space of {}: {e}", probe.display())))
}

/// Fail with both sizes when `required` bytes do not fit under `path`
pub fn check_space(path: &Path, required: u64) -> Result<()> {
    let available = available_space(path)?;
    debug!(
        "Space check on {}: {} required, {} available",
        path.display(),
        required,
        available
    );
    if required > available {
        return Err(Error::InsufficientSpace {
            path: path.to_path_buf(),
            required: format_size(required),
            available: format_size(available),
        });
    }
    Ok(())
}

/// Total size of regular files below `dir`
pub fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 KB");
        assert_eq!(format_size(1), "1 KB");
        assert_eq!(format_size(2048), "2 KB");
        assert_eq!(format_size(MB), "1 MB");
        assert_eq!(format_size(10 * MB + 1), "11 MB");
    }

    #[test]
    fn test_check_space_fails_fast() {
        let dir = TempDir::new().unwrap();
        assert!(check_space(dir.path(), 1).is_ok());
        let err = check_space(&dir.path().join("not/yet/created"), u64::MAX).unwrap_err();
        match err {
            Error::InsufficientSpace { required, available, .. } => {
                assert!(required.ends_with("MB"));
                assert!(!available.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_directory_size() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a"), vec![0u8; 100]).unwrap();
        std::fs::write(dir.path().join("sub/b"), vec![0u8; 50]).unwrap();
        assert_eq!(directory_size(dir.path()), 150);
    }
}
