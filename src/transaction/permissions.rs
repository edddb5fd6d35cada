// src/transaction/permissions.rs

//! Post-group permission fix-up
//!
//! Executable bits and extended attributes requested by the extraction
//! engine are applied once a group is on disk. Failures are logged and
//! collected; they never roll back an install.

use crate::transaction::engine::{InstallContext, XattrRequest};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A permission request that could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Add execute bits wherever the matching read bit is set
#[cfg(unix)]
pub fn make_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = std::fs::metadata(path)?.permissions().mode();
    let exec = (mode & 0o444) >> 2;
    if mode & exec == exec {
        return Ok(());
    }
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode | exec))
}

#[cfg(not(unix))]
pub fn make_executable(path: &Path) -> io::Result<()> {
    std::fs::metadata(path).map(|_| ())
}

#[cfg(target_os = "linux")]
pub fn set_xattr(path: &Path, name: &str, value: &[u8]) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let c_name =
        CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    // SAFETY: both strings are NUL-terminated and outlive the call; value
    // points to value.len() readable bytes.
    let rc = unsafe {
        libc::setxattr(
            c_path.as_ptr(),
            c_name.as_ptr(),
            value.as_ptr() as *const libc::c_void,
            value.len(),
            0,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn set_xattr(_path: &Path, name: &str, _value: &[u8]) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("extended attribute {name} not supported on this platform"),
    ))
}

/// Apply and clear every pending request in `ctx`
pub fn apply(ctx: &mut InstallContext) -> Vec<PermissionFailure> {
    let (executables, xattrs) = ctx.take_permission_requests();
    let mut failures = Vec::new();

    for path in executables {
        match make_executable(&path) {
            Ok(()) => debug!("Marked {} executable", path.display()),
            Err(e) => {
                warn!("Cannot set executable bit on {}: {}", path.display(), e);
                failures.push(PermissionFailure {
                    path,
                    reason: e.to_string(),
                });
            }
        }
    }

    for XattrRequest { path, name, value } in xattrs {
        if let Err(e) = set_xattr(&path, &name, &value) {
            warn!("Cannot set {} on {}: {}", name, path.display(), e);
            failures.push(PermissionFailure {
                path,
                reason: e.to_string(),
            });
        }
    }

    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_make_executable_follows_read_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("server");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        make_executable(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn test_failures_are_collected_not_fatal() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("ok");
        std::fs::write(&present, b"x").unwrap();

        let mut ctx = InstallContext::new(dir.path());
        ctx.mark_executable(&present);
        ctx.mark_executable(dir.path().join("missing"));

        let failures = apply(&mut ctx);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, dir.path().join("missing"));
        assert!(ctx.executables().is_empty());
    }
}
