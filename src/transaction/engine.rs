// src/transaction/engine.rs

//! Extraction engine seam
//!
//! The engine writes archive entries to disk and undoes them again. It is
//! supplied by the caller; the orchestrator only hands it verified artifacts
//! and collects the paths it reports.

use crate::asset::ResolvedAsset;
use crate::error::Result;
use crate::uninstall::UninstallTarget;
use std::path::{Path, PathBuf};

/// Extended attribute to set once a group is on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XattrRequest {
    pub path: PathBuf,
    pub name: String,
    pub value: Vec<u8>,
}

/// Mutable state shared between the orchestrator and the engine for one
/// group (install) or one batch (uninstall)
#[derive(Debug, Clone)]
pub struct InstallContext {
    install_root: PathBuf,
    tracked_files: Vec<PathBuf>,
    executables: Vec<PathBuf>,
    xattrs: Vec<XattrRequest>,
}

impl InstallContext {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            tracked_files: Vec::new(),
            executables: Vec::new(),
            xattrs: Vec::new(),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Record files for rollback (install) or bookkeeping (uninstall)
    pub fn track<I>(&mut self, files: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for file in files {
            if !self.tracked_files.contains(&file) {
                self.tracked_files.push(file);
            }
        }
    }

    pub fn tracked_files(&self) -> &[PathBuf] {
        &self.tracked_files
    }

    pub fn take_tracked(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.tracked_files)
    }

    /// Ask for the executable bits to be set after the group completes
    pub fn mark_executable(&mut self, path: impl Into<PathBuf>) {
        self.executables.push(path.into());
    }

    pub fn set_xattr(&mut self, path: impl Into<PathBuf>, name: impl Into<String>, value: Vec<u8>) {
        self.xattrs.push(XattrRequest {
            path: path.into(),
            name: name.into(),
            value,
        });
    }

    pub fn executables(&self) -> &[PathBuf] {
        &self.executables
    }

    pub fn xattrs(&self) -> &[XattrRequest] {
        &self.xattrs
    }

    /// Drain pending permission requests
    pub fn take_permission_requests(&mut self) -> (Vec<PathBuf>, Vec<XattrRequest>) {
        (
            std::mem::take(&mut self.executables),
            std::mem::take(&mut self.xattrs),
        )
    }
}

/// Writes and removes asset content
pub trait ExtractionEngine {
    /// Materialize `asset` from the verified `artifact`; returns every path written
    fn install(
        &mut self,
        asset: &ResolvedAsset,
        artifact: &Path,
        ctx: &mut InstallContext,
    ) -> Result<Vec<PathBuf>>;

    /// Remove `target`, given the files recorded for it at install time;
    /// returns the files restored to an earlier state
    fn uninstall(
        &mut self,
        target: &UninstallTarget,
        recorded: &[PathBuf],
        ctx: &mut InstallContext,
    ) -> Result<Vec<PathBuf>>;
}
