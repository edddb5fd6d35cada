// src/asset.rs

//! Resolved assets and install groups
//!
//! A [`ResolvedAsset`] pairs one descriptor with the place its backing
//! artifact lives. Assets move Pending -> Downloaded -> Verified -> Installed
//! and end Cleaned, either after a successful install or when the group they
//! belong to fails.

use crate::acquire::IntegrityRecord;
use crate::descriptor::{FeatureDescriptor, FixDescriptor};
use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// What an asset installs
#[derive(Debug, Clone)]
pub enum AssetPayload {
    Feature(Arc<FeatureDescriptor>),
    Fix(Arc<FixDescriptor>),
    /// Samples, open-source integrations and other non-feature resources
    Other { id: String, kind: String },
}

impl AssetPayload {
    pub fn id(&self) -> &str {
        match self {
            AssetPayload::Feature(f) => f.symbolic_name(),
            AssetPayload::Fix(f) => f.id(),
            AssetPayload::Other { id, .. } => id,
        }
    }

    pub fn kind_name(&self) -> &str {
        match self {
            AssetPayload::Feature(_) => "feature",
            AssetPayload::Fix(_) => "fix",
            AssetPayload::Other { kind, .. } => kind,
        }
    }
}

/// Where the artifact backing an asset lives
#[derive(Debug, Clone)]
pub enum AssetSource {
    /// Artifact supplied by the caller; never deleted by the core
    Local(PathBuf),
    /// Artifact fetched into the transaction's temp directory
    TemporaryDownload(PathBuf),
    /// Not fetched yet
    Pending {
        url: String,
        integrity: IntegrityRecord,
        size: Option<u64>,
    },
}

/// Lifecycle of a single asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssetState {
    Pending,
    Downloaded,
    Verified,
    Installed,
    Cleaned,
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetState::Pending => "pending",
            AssetState::Downloaded => "downloaded",
            AssetState::Verified => "verified",
            AssetState::Installed => "installed",
            AssetState::Cleaned => "cleaned",
        };
        f.write_str(s)
    }
}

/// One descriptor plus its artifact location
#[derive(Debug, Clone)]
pub struct ResolvedAsset {
    payload: AssetPayload,
    source: AssetSource,
    temporary: bool,
    state: AssetState,
}

impl ResolvedAsset {
    /// Asset backed by a caller-owned file
    pub fn local(payload: AssetPayload, path: impl Into<PathBuf>) -> Self {
        Self {
            payload,
            source: AssetSource::Local(path.into()),
            temporary: false,
            state: AssetState::Pending,
        }
    }

    /// Asset that still has to be fetched
    pub fn pending(
        payload: AssetPayload,
        url: impl Into<String>,
        integrity: IntegrityRecord,
        size: Option<u64>,
    ) -> Self {
        Self {
            payload,
            source: AssetSource::Pending {
                url: url.into(),
                integrity,
                size,
            },
            temporary: true,
            state: AssetState::Pending,
        }
    }

    pub fn feature(descriptor: Arc<FeatureDescriptor>, path: impl Into<PathBuf>) -> Self {
        Self::local(AssetPayload::Feature(descriptor), path)
    }

    pub fn fix(descriptor: Arc<FixDescriptor>, path: impl Into<PathBuf>) -> Self {
        Self::local(AssetPayload::Fix(descriptor), path)
    }

    pub fn payload(&self) -> &AssetPayload {
        &self.payload
    }

    pub fn id(&self) -> &str {
        self.payload.id()
    }

    pub fn feature_descriptor(&self) -> Option<&Arc<FeatureDescriptor>> {
        match &self.payload {
            AssetPayload::Feature(f) => Some(f),
            _ => None,
        }
    }

    pub fn fix_descriptor(&self) -> Option<&Arc<FixDescriptor>> {
        match &self.payload {
            AssetPayload::Fix(f) => Some(f),
            _ => None,
        }
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    /// Local path of the artifact, if it is on disk
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            AssetSource::Local(p) | AssetSource::TemporaryDownload(p) => Some(p),
            AssetSource::Pending { .. } => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn state(&self) -> AssetState {
        self.state
    }

    /// Artifact size: advertised for pending assets, on-disk otherwise
    pub fn size(&self) -> u64 {
        match &self.source {
            AssetSource::Pending { size, .. } => size.unwrap_or(0),
            AssetSource::Local(p) | AssetSource::TemporaryDownload(p) => {
                std::fs::metadata(p).map(|m| m.len()).unwrap_or(0)
            }
        }
    }

    /// Move to `next`; states only go forward, except Cleaned which is always allowed
    pub fn advance(&mut self, next: AssetState) -> Result<()> {
        if next != AssetState::Cleaned && next <= self.state {
            return Err(Error::RuntimeError(format!(
                "asset {} cannot move from {} to {}",
                self.id(),
                self.state,
                next
            )));
        }
        debug!("Asset {}: {} -> {}", self.id(), self.state, next);
        self.state = next;
        Ok(())
    }

    /// Record a completed download into the transaction temp directory
    pub fn mark_downloaded(&mut self, path: PathBuf) -> Result<()> {
        self.source = AssetSource::TemporaryDownload(path);
        self.temporary = true;
        self.advance(AssetState::Downloaded)
    }

    /// Remove the backing file if the core owns it
    ///
    /// Runs after every install attempt, successful or not. Caller-supplied
    /// local artifacts are left alone.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.temporary
            && let AssetSource::TemporaryDownload(path) = &self.source
            && path.exists()
        {
            std::fs::remove_file(path)?;
            debug!("Removed temporary artifact {}", path.display());
        }
        self.state = AssetState::Cleaned;
        Ok(())
    }
}

impl fmt::Display for ResolvedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.payload.kind_name(), self.id())
    }
}

/// One resolution unit: a requested name plus everything it pulled in
///
/// Assets are stored in install order, dependencies first.
#[derive(Debug, Clone, Default)]
pub struct InstallGroup {
    name: String,
    assets: Vec<ResolvedAsset>,
}

impl InstallGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assets: Vec::new(),
        }
    }

    pub fn with_assets(name: impl Into<String>, assets: Vec<ResolvedAsset>) -> Self {
        Self {
            name: name.into(),
            assets,
        }
    }

    pub fn push(&mut self, asset: ResolvedAsset) {
        self.assets.push(asset);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assets(&self) -> &[ResolvedAsset] {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut [ResolvedAsset] {
        &mut self.assets
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.iter().any(|a| a.id() == id)
    }
}

/// The ordered groups of one install transaction
#[derive(Debug, Clone, Default)]
pub struct InstallPlan {
    groups: Vec<InstallGroup>,
}

impl InstallPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_group(&mut self, group: InstallGroup) {
        if !group.is_empty() {
            self.groups.push(group);
        }
    }

    pub fn groups(&self) -> &[InstallGroup] {
        &self.groups
    }

    pub fn groups_mut(&mut self) -> &mut Vec<InstallGroup> {
        &mut self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(InstallGroup::is_empty)
    }

    pub fn asset_count(&self) -> usize {
        self.groups.iter().map(InstallGroup::len).sum()
    }

    pub fn assets(&self) -> impl Iterator<Item = &ResolvedAsset> {
        self.groups.iter().flat_map(|g| g.assets.iter())
    }

    /// Sum of every asset's size, used by the disk-space preflight
    pub fn total_size(&self) -> u64 {
        self.assets().map(ResolvedAsset::size).sum()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.groups.iter().any(|g| g.contains(id))
    }
}
