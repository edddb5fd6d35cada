// src/transaction/mod.rs

//! Install and uninstall transactions
//!
//! [`Director`] owns everything one logical operation needs: the registry
//! connection, the resolver with its memoization cache, the acquisition
//! pipeline, the key ring and the caller's extraction engine. Only one
//! operation is in flight per instance.
//!
//! # Group lifecycle
//!
//! ```text
//! Pending -> Downloading -> Verified -> Installing -> Installed
//!                 ^                          |
//!                 +------- next asset -------+
//!
//! any non-terminal state -> RolledBack | Failed
//! ```
//!
//! A failure rolls back the current group, or every group of the
//! transaction when `rollback_all` is set. Checksums and the runtime
//! fingerprint are written once, after the last group succeeds.

pub mod engine;
pub mod permissions;
mod removal;

pub use engine::{ExtractionEngine, InstallContext, XattrRequest};
pub use permissions::{PermissionFailure, make_executable, set_xattr};
pub use removal::UninstallReport;

use crate::acquire::{
    AcquireRequest, AcquiredArtifact, Acquirer, KeyRing, LockProbe, SIGNATURE_EXTENSION,
    SignedArtifact, Transport,
};
use crate::asset::{AssetPayload, AssetSource, AssetState, InstallGroup, InstallPlan, ResolvedAsset};
use crate::checksums::{self, ChecksumManifest};
use crate::config::EngineConfig;
use crate::db::{
    self,
    models::{InstalledFeature, InstalledFile, InstalledFix, OwnerKind},
};
use crate::descriptor::{Descriptor, FeatureDescriptor, FixDescriptor, ProductInfo};
use crate::error::{Error, Result};
use crate::fixes;
use crate::manifest::ManifestReader;
use crate::progress::{
    self, CancelToken, InstallListener, ProgressEvent, ProgressReporter, ProgressState,
};
use crate::resolver::{self, LocalResolver, RepositoryResolver, ResolutionPolicy, ResolvedPlan};
use crate::space;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Install group state machine phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    Pending,
    Downloading,
    Verified,
    Installing,
    Installed,
    /// Files written by the group were removed again
    RolledBack,
    /// Rollback could not remove every file
    Failed,
}

impl GroupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Installed | Self::RolledBack | Self::Failed)
    }

    /// Allowed transitions; an installed group can still be rolled back
    /// when a later group fails under `rollback_all`
    pub fn can_advance(self, next: GroupState) -> bool {
        use GroupState::*;
        match (self, next) {
            (Pending, Downloading)
            | (Downloading, Verified)
            | (Verified, Installing)
            | (Installing, Downloading)
            | (Installing, Installed) => true,
            (Installed, RolledBack | Failed) => true,
            (from, RolledBack | Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Verified => "verified",
            Self::Installing => "installing",
            Self::Installed => "installed",
            Self::RolledBack => "rolled back",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Final state of one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub name: String,
    pub state: GroupState,
    /// Asset ids in install order
    pub assets: Vec<String>,
    /// Files the extraction engine wrote for this group
    pub files: Vec<PathBuf>,
}

/// Summary of an install transaction
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    pub transaction_id: String,
    pub groups: Vec<GroupOutcome>,
    /// Assets whose detached signature could not be verified
    pub failed_signatures: Vec<String>,
    pub permission_failures: Vec<PermissionFailure>,
    /// Runtime fingerprint written at commit
    pub fingerprint: Option<String>,
}

impl InstallReport {
    fn new(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            ..Self::default()
        }
    }

    pub fn installed_assets(&self) -> Vec<&str> {
        self.groups
            .iter()
            .filter(|g| g.state == GroupState::Installed)
            .flat_map(|g| g.assets.iter().map(String::as_str))
            .collect()
    }

    pub fn files_written(&self) -> Vec<&Path> {
        self.groups
            .iter()
            .filter(|g| g.state == GroupState::Installed)
            .flat_map(|g| g.files.iter().map(PathBuf::as_path))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.fingerprint.is_some() && self.groups.iter().all(|g| g.state == GroupState::Installed)
    }
}

/// In-flight bookkeeping for the group being installed
struct GroupRun {
    name: String,
    state: GroupState,
    ctx: InstallContext,
    records: Vec<(AssetPayload, Vec<PathBuf>)>,
}

impl GroupRun {
    fn new(name: &str, install_root: &Path) -> Self {
        Self {
            name: name.to_string(),
            state: GroupState::Pending,
            ctx: InstallContext::new(install_root),
            records: Vec::new(),
        }
    }

    fn advance(&mut self, next: GroupState) -> Result<()> {
        if !self.state.can_advance(next) {
            return Err(Error::RuntimeError(format!(
                "group {} cannot move from {} to {}",
                self.name, self.state, next
            )));
        }
        debug!("Group {}: {} -> {}", self.name, self.state, next);
        self.state = next;
        Ok(())
    }
}

/// Install/uninstall orchestrator
pub struct Director<R> {
    config: EngineConfig,
    resolver: LocalResolver<R>,
    engine: Box<dyn ExtractionEngine>,
    reporter: ProgressReporter,
    acquirer: Acquirer,
    keyring: KeyRing,
    lock_probe: LockProbe,
    conn: Connection,
    last_install: Option<InstallReport>,
    last_uninstall: Option<UninstallReport>,
}

impl<R: ManifestReader> Director<R> {
    /// Open the registry, build the transport and load signing keys
    pub fn new(config: EngineConfig, reader: R, engine: Box<dyn ExtractionEngine>) -> Result<Self> {
        config.validate()?;
        let transport = Transport::new(config.transport_config())?;
        let keyring = if config.signatures.verify {
            KeyRing::load(&config.signatures.keys, Some(&transport))?
        } else {
            KeyRing::new()
        };
        let conn = db::open(&config.registry_path())?;
        info!(
            "Provisioning engine ready for {}",
            config.install_root.display()
        );

        Ok(Self {
            config,
            resolver: LocalResolver::new(reader),
            engine,
            reporter: ProgressReporter::new(),
            acquirer: Acquirer::new(transport),
            keyring,
            lock_probe: LockProbe::default(),
            conn,
            last_install: None,
            last_uninstall: None,
        })
    }

    pub fn with_products(mut self, products: Vec<ProductInfo>) -> Self {
        self.resolver.set_products(products);
        self
    }

    pub fn with_lock_probe(mut self, probe: LockProbe) -> Self {
        self.lock_probe = probe;
        self
    }

    pub fn with_keyring(mut self, keyring: KeyRing) -> Self {
        self.keyring = keyring;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.reporter = self.reporter.with_cancel_token(token);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn InstallListener>) {
        self.reporter.add_listener(listener);
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.reporter.cancel_token().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Connection {
        &self.conn
    }

    pub fn resolver(&self) -> &LocalResolver<R> {
        &self.resolver
    }

    /// Report of the most recent install, including failed ones
    pub fn last_install(&self) -> Option<&InstallReport> {
        self.last_install.as_ref()
    }

    pub fn last_uninstall(&self) -> Option<&UninstallReport> {
        self.last_uninstall.as_ref()
    }

    pub fn installed_features(&self) -> Result<Vec<Arc<FeatureDescriptor>>> {
        InstalledFeature::list_descriptors(&self.conn)
    }

    pub fn installed_fixes(&self) -> Result<Vec<Arc<FixDescriptor>>> {
        InstalledFix::list_descriptors(&self.conn)
    }

    /// Resolve `names` from `candidate_dir` and add satisfied auto-features
    ///
    /// Each activated auto-feature becomes its own group, after the
    /// requested ones.
    pub fn resolve(
        &mut self,
        names: &[String],
        candidate_dir: &Path,
        allow_network: bool,
    ) -> Result<ResolvedPlan> {
        self.reporter.cancel_token().reset();
        self.resolve_plan(names, candidate_dir, allow_network)
    }

    fn resolve_plan(
        &mut self,
        names: &[String],
        candidate_dir: &Path,
        allow_network: bool,
    ) -> Result<ResolvedPlan> {
        self.reporter.report(ProgressEvent::new(
            ProgressState::Resolving,
            0,
            format!("Resolving {}", names.join(", ")),
        ))?;

        let installed = self.installed_features()?;
        self.resolver.set_installed(installed.iter().map(Arc::as_ref));
        let mut resolved = self.resolver.resolve_all(names, candidate_dir, allow_network)?;

        let candidates = self.resolver.auto_candidates(candidate_dir)?;
        let selected: Vec<ResolvedAsset> = resolved.plan.assets().cloned().collect();
        let activated = resolver::activate(candidates, installed.iter().map(Arc::as_ref), &selected);

        for auto in activated {
            if resolved.plan.contains(auto.id()) {
                continue;
            }
            let name = auto.id().to_string();
            match self.resolver.resolve(&name, candidate_dir, allow_network) {
                Ok(closure) => {
                    let assets: Vec<ResolvedAsset> = closure
                        .assets
                        .into_iter()
                        .filter(|a| !resolved.plan.contains(a.id()))
                        .collect();
                    for missing in closure.unresolved {
                        if !resolved.unresolved.contains(&missing) {
                            resolved.unresolved.push(missing);
                        }
                    }
                    info!("Auto-feature {} activated", name);
                    resolved.plan.push_group(InstallGroup::with_assets(name, assets));
                }
                Err(e) => warn!("Auto-feature {} skipped: {}", name, e),
            }
        }

        self.reporter.report(ProgressEvent::new(
            ProgressState::Resolving,
            progress::RESOLVE_PERCENT,
            format!(
                "Resolved {} assets, {} left for the repository",
                resolved.plan.asset_count(),
                resolved.unresolved.len()
            ),
        ))?;
        Ok(resolved)
    }

    /// Ask the repository for `names`
    pub fn resolve_network(
        &self,
        names: &[String],
        repository: &dyn RepositoryResolver,
    ) -> Result<InstallPlan> {
        if names.is_empty() {
            return Err(Error::BadArgument("no features requested".to_string()));
        }
        let policy = ResolutionPolicy {
            products: self.resolver.products().to_vec(),
            installed: self
                .installed_features()?
                .iter()
                .map(|f| f.symbolic_name().to_string())
                .collect(),
        };
        let groups = repository.resolve(names, &policy)?;
        let plan = resolver::network::into_plan(names, groups);
        debug!("Repository resolved {} assets", plan.asset_count());
        Ok(plan)
    }

    /// Resolve and install `names`
    ///
    /// Names are looked up in `candidate_dir` first; whatever is left goes to
    /// `repository` when one is given.
    pub fn install_features(
        &mut self,
        names: &[String],
        candidate_dir: Option<&Path>,
        repository: Option<&dyn RepositoryResolver>,
    ) -> Result<InstallReport> {
        self.reporter.cancel_token().reset();
        let (mut plan, unresolved) = match candidate_dir {
            Some(dir) => {
                let resolved = self.resolve_plan(names, dir, repository.is_some())?;
                (resolved.plan, resolved.unresolved)
            }
            None => (InstallPlan::new(), names.to_vec()),
        };

        if !unresolved.is_empty() {
            match repository {
                Some(repository) => {
                    let remote = self.resolve_network(&unresolved, repository)?;
                    for group in remote.groups() {
                        let assets: Vec<ResolvedAsset> = group
                            .assets()
                            .iter()
                            .filter(|a| !plan.contains(a.id()))
                            .cloned()
                            .collect();
                        plan.push_group(InstallGroup::with_assets(group.name(), assets));
                    }
                }
                None => {
                    return Err(Error::BadArgument(format!(
                        "no repository to resolve {}",
                        unresolved.join(", ")
                    )));
                }
            }
        }

        if plan.is_empty() {
            return Err(Error::AlreadyExists(names.join(", ")));
        }
        let rollback_all = self.config.rollback_all;
        self.run_install(plan, rollback_all)
    }

    /// Install fix archives, ordered so that a fix lands after the fixes it
    /// depends on
    pub fn install_fixes(&mut self, archives: &[PathBuf]) -> Result<InstallReport> {
        if archives.is_empty() {
            return Err(Error::BadArgument("no fixes to install".to_string()));
        }
        let installed: HashSet<String> = self
            .installed_fixes()?
            .iter()
            .map(|f| f.id().to_string())
            .collect();

        let mut group = InstallGroup::new("fixes");
        for path in archives {
            match self.resolver.reader().parse(path)? {
                Descriptor::Fix(fix) if installed.contains(fix.id()) => {
                    info!("Fix {} is already installed", fix.id());
                }
                Descriptor::Fix(fix) => group.push(ResolvedAsset::fix(Arc::new(fix), path.clone())),
                Descriptor::Feature(feature) => {
                    return Err(Error::BadArgument(format!(
                        "{} contains feature {}, not a fix",
                        path.display(),
                        feature.symbolic_name()
                    )));
                }
            }
        }

        if group.is_empty() {
            return Err(Error::AlreadyExists("all requested fixes".to_string()));
        }
        let mut plan = InstallPlan::new();
        plan.push_group(group);
        self.install(plan)
    }

    /// Disk-space preflight; returns the number of bytes required
    pub fn check_resources(&self, plan: &InstallPlan) -> Result<u64> {
        let required = plan.total_size();
        space::check_space(&self.config.install_root, required)?;
        Ok(required)
    }

    /// Install `plan` with the configured rollback scope
    pub fn install(&mut self, plan: InstallPlan) -> Result<InstallReport> {
        let rollback_all = self.config.rollback_all;
        self.install_with(plan, rollback_all)
    }

    pub fn install_with(&mut self, plan: InstallPlan, rollback_all: bool) -> Result<InstallReport> {
        self.reporter.cancel_token().reset();
        self.run_install(plan, rollback_all)
    }

    fn run_install(&mut self, mut plan: InstallPlan, rollback_all: bool) -> Result<InstallReport> {
        if plan.is_empty() {
            return Err(Error::BadArgument("nothing to install".to_string()));
        }
        self.check_resources(&plan)?;

        let transaction_id = Uuid::new_v4().to_string();
        let temp_root = self.config.temp_dir();
        std::fs::create_dir_all(&temp_root)?;
        let staging = tempfile::Builder::new()
            .prefix("txn-")
            .tempdir_in(&temp_root)?;
        info!(
            "Transaction {}: {} assets in {} groups",
            transaction_id,
            plan.asset_count(),
            plan.groups().len()
        );

        let mut report = InstallReport::new(&transaction_id);
        let mut owners: Vec<Vec<(OwnerKind, String)>> = Vec::new();
        let total = plan.asset_count();
        let mut done = 0usize;

        for index in 0..plan.groups().len() {
            let group = &mut plan.groups_mut()[index];
            order_fixes(group);
            let mut run = GroupRun::new(group.name(), &self.config.install_root);

            let outcome = self.install_group(group, &mut run, staging.path(), &mut done, total, &mut report);
            for asset in group.assets_mut() {
                if let Err(e) = asset.cleanup() {
                    warn!("Cleanup of {} failed: {}", asset, e);
                }
            }

            let recorded = outcome.and_then(|()| {
                report.permission_failures.extend(permissions::apply(&mut run.ctx));
                self.record_group(&run)
            });

            match recorded {
                Ok(group_owners) => {
                    run.advance(GroupState::Installed)?;
                    info!("Group {} installed", run.name);
                    owners.push(group_owners);
                    report.groups.push(GroupOutcome {
                        name: run.name,
                        state: GroupState::Installed,
                        assets: run.records.iter().map(|(p, _)| p.id().to_string()).collect(),
                        files: run.ctx.take_tracked(),
                    });
                }
                Err(e) => {
                    self.abort(&mut plan, index, run, &owners, &mut report, rollback_all, &e);
                    self.last_install = Some(report);
                    return Err(e);
                }
            }
        }

        let files: Vec<PathBuf> = report.files_written().into_iter().map(Path::to_path_buf).collect();
        self.notify(ProgressEvent::new(
            ProgressState::CleaningUp,
            progress::CLEANUP_PERCENT,
            "Committing checksums",
        ));
        let fingerprint = self.commit(&files)?;
        report.fingerprint = Some(fingerprint);
        drop(staging);

        self.notify(ProgressEvent::new(
            ProgressState::Complete,
            progress::COMPLETE_PERCENT,
            format!("Installed {} assets", report.installed_assets().len()),
        ));
        info!("Transaction {} committed", transaction_id);
        self.last_install = Some(report.clone());
        Ok(report)
    }

    fn install_group(
        &mut self,
        group: &mut InstallGroup,
        run: &mut GroupRun,
        staging: &Path,
        done: &mut usize,
        total: usize,
        report: &mut InstallReport,
    ) -> Result<()> {
        for asset in group.assets_mut() {
            self.reporter.check(&format!("before {}", asset.id()))?;
            let percent = progress::install_percent(*done, total);

            run.advance(GroupState::Downloading)?;
            let artifact = self.fetch(asset, staging, percent, report)?;
            run.advance(GroupState::Verified)?;

            self.reporter.report(
                ProgressEvent::new(ProgressState::Installing, percent, format!("Installing {asset}"))
                    .for_asset(asset.id()),
            )?;
            run.advance(GroupState::Installing)?;

            let written = self
                .engine
                .install(asset, &artifact, &mut run.ctx)
                .map_err(|e| {
                    if e.is_cancellation() {
                        e
                    } else {
                        Error::wrap_extraction(asset.id(), e)
                    }
                })?;
            debug!("{} wrote {} files", asset, written.len());
            run.ctx.track(written.iter().cloned());
            run.records.push((asset.payload().clone(), written));
            asset.advance(AssetState::Installed)?;
            *done += 1;
            info!("Installed {}", asset);
        }
        Ok(())
    }

    /// Make the asset's artifact available locally and verified
    fn fetch(
        &self,
        asset: &mut ResolvedAsset,
        staging: &Path,
        percent: u8,
        report: &mut InstallReport,
    ) -> Result<PathBuf> {
        let path = match asset.source().clone() {
            AssetSource::Local(path) | AssetSource::TemporaryDownload(path) => path,
            AssetSource::Pending { url, integrity, .. } => {
                let id = asset.id().to_string();
                let mut integrity = integrity;
                if self.config.signatures.verify && integrity.signature_url().is_none() {
                    integrity = integrity.with_signature(format!("{url}.{SIGNATURE_EXTENSION}"));
                }
                let target = staging.join(artifact_file_name(&id, &url));
                let request = AcquireRequest {
                    asset: &id,
                    url: &url,
                    target: &target,
                    integrity: &integrity,
                    credentials: None,
                };

                let reporter = &self.reporter;
                let mut last_step = None;
                let acquired = self.acquirer.acquire(&request, &mut |bytes, length| {
                    let Some(length) = length.filter(|l| *l > 0) else {
                        return;
                    };
                    let step = (bytes.saturating_mul(10) / length).min(10);
                    if last_step == Some(step) {
                        return;
                    }
                    last_step = Some(step);
                    let event = ProgressEvent::new(
                        ProgressState::Downloading,
                        percent,
                        format!("Downloading {id}: {}%", step * 10),
                    )
                    .for_asset(id.as_str());
                    // honoured at the next checkpoint, downloads are not interrupted
                    if reporter.report(event).is_err() {
                        debug!("Cancellation requested while downloading {}", id);
                    }
                })?;

                asset.mark_downloaded(acquired.path.clone())?;
                if self.config.signatures.verify {
                    self.check_signature(&id, &acquired, report)?;
                }
                acquired.path
            }
        };
        asset.advance(AssetState::Verified)?;
        Ok(path)
    }

    fn check_signature(
        &self,
        id: &str,
        acquired: &AcquiredArtifact,
        report: &mut InstallReport,
    ) -> Result<()> {
        let verified = match &acquired.signature {
            Some(signature) => self
                .keyring
                .verify_all(&[SignedArtifact {
                    asset: id.to_string(),
                    file: acquired.path.clone(),
                    signature: signature.clone(),
                }])
                .is_empty(),
            None => {
                warn!("No signature published for {}", id);
                false
            }
        };

        if !verified {
            report.failed_signatures.push(id.to_string());
            if self.config.signatures.abort_on_failure {
                return Err(Error::SignatureUnverified(format!("{id} could not be verified")));
            }
        }
        Ok(())
    }

    /// Registry rows for every asset of a finished group
    fn record_group(&mut self, run: &GroupRun) -> Result<Vec<(OwnerKind, String)>> {
        db::transaction(&mut self.conn, |tx| {
            let mut owners = Vec::new();
            for (payload, files) in &run.records {
                match payload {
                    AssetPayload::Feature(feature) => {
                        InstalledFeature::from_descriptor(feature)?.insert(tx)?;
                        InstalledFile::insert_many(tx, OwnerKind::Feature, feature.symbolic_name(), files)?;
                        owners.push((OwnerKind::Feature, feature.symbolic_name().to_string()));
                    }
                    AssetPayload::Fix(fix) => {
                        InstalledFix::from_descriptor(fix)?.insert(tx)?;
                        InstalledFile::insert_many(tx, OwnerKind::Fix, fix.id(), files)?;
                        owners.push((OwnerKind::Fix, fix.id().to_string()));
                    }
                    AssetPayload::Other { id, kind } => {
                        debug!("{} {} is not tracked in the registry", kind, id);
                    }
                }
            }
            Ok(owners)
        })
    }

    fn forget(&mut self, kind: OwnerKind, id: &str) -> Result<()> {
        db::transaction(&mut self.conn, |tx| {
            match kind {
                OwnerKind::Feature => InstalledFeature::delete(tx, id)?,
                OwnerKind::Fix => InstalledFix::delete(tx, id)?,
            };
            InstalledFile::delete_for(tx, kind, id)?;
            Ok(())
        })
    }

    /// Roll back after a failure in group `index`
    #[allow(clippy::too_many_arguments)]
    fn abort(
        &mut self,
        plan: &mut InstallPlan,
        index: usize,
        run: GroupRun,
        owners: &[Vec<(OwnerKind, String)>],
        report: &mut InstallReport,
        rollback_all: bool,
        cause: &Error,
    ) {
        if cause.is_cancellation() {
            info!("Transaction {} cancelled: {}", report.transaction_id, cause);
        } else {
            error!("Group {} failed: {}", run.name, cause);
        }

        let mut run = run;
        let left = rollback_files(run.ctx.tracked_files());
        let state = if left == 0 {
            GroupState::RolledBack
        } else {
            GroupState::Failed
        };
        if let Err(e) = run.advance(state) {
            warn!("{}", e);
        }
        report.groups.push(GroupOutcome {
            name: run.name.clone(),
            state,
            assets: run.records.iter().map(|(p, _)| p.id().to_string()).collect(),
            files: run.ctx.take_tracked(),
        });

        if rollback_all {
            for (outcome, group_owners) in report.groups.iter_mut().zip(owners) {
                if outcome.state != GroupState::Installed {
                    continue;
                }
                let left = rollback_files(&outcome.files);
                for (kind, id) in group_owners {
                    if let Err(e) = self.forget(*kind, id) {
                        warn!("Cannot remove registry entry for {} {}: {}", kind, id, e);
                    }
                }
                outcome.state = if left == 0 {
                    GroupState::RolledBack
                } else {
                    GroupState::Failed
                };
                info!("Group {} {}", outcome.name, outcome.state);
            }
        }

        for group in plan.groups_mut().iter_mut().skip(index + 1) {
            for asset in group.assets_mut() {
                if let Err(e) = asset.cleanup() {
                    warn!("Cleanup of {} failed: {}", asset, e);
                }
            }
        }
    }

    /// Write checksums and the runtime fingerprint for `files`
    fn commit(&self, files: &[PathBuf]) -> Result<String> {
        let manifest_path = self.config.checksum_manifest();
        let mut manifest = ChecksumManifest::load(&manifest_path)?;
        manifest.update(&self.config.install_root, files)?;
        manifest.save(&manifest_path)?;

        let names: Vec<String> = self
            .installed_features()?
            .iter()
            .map(|f| f.symbolic_name().to_string())
            .collect();
        let fingerprint = manifest.fingerprint(names.iter().map(String::as_str));
        checksums::write_fingerprint(&self.config.fingerprint_path(), &fingerprint)?;
        Ok(fingerprint)
    }

    /// Report outside a checkpoint; a cancellation here is ignored
    fn notify(&self, event: ProgressEvent) {
        if let Err(e) = self.reporter.report(event) {
            debug!("{}, ignored outside a checkpoint", e);
        }
    }

    /// Remove the install temp directory and anything left in it
    pub fn cleanup(&mut self) -> Result<()> {
        self.notify(ProgressEvent::new(
            ProgressState::CleaningUp,
            progress::CLEANUP_PERCENT,
            "Removing temporary files",
        ));
        let temp = self.config.temp_dir();
        if temp.exists() {
            std::fs::remove_dir_all(&temp)?;
            debug!("Removed {}", temp.display());
        }
        Ok(())
    }
}

/// Reorder the fixes of a group in place; other assets keep their slots
fn order_fixes(group: &mut InstallGroup) {
    let fix_list: Vec<Arc<FixDescriptor>> = group
        .assets()
        .iter()
        .filter_map(|a| a.fix_descriptor().cloned())
        .collect();
    if fix_list.len() < 2 {
        return;
    }

    let by_id: HashMap<&str, &ResolvedAsset> = group
        .assets()
        .iter()
        .filter(|a| a.fix_descriptor().is_some())
        .map(|a| (a.id(), a))
        .collect();
    let mut ordered = fixes::order(&fix_list).into_iter();

    let reordered: Vec<ResolvedAsset> = group
        .assets()
        .iter()
        .map(|asset| {
            if asset.fix_descriptor().is_none() {
                return asset.clone();
            }
            ordered
                .next()
                .and_then(|fix| by_id.get(fix.id()).map(|a| (*a).clone()))
                .unwrap_or_else(|| asset.clone())
        })
        .collect();

    *group = InstallGroup::with_assets(group.name().to_string(), reordered);
}

/// Remove `files` newest first; returns how many could not be removed
fn rollback_files(files: &[PathBuf]) -> usize {
    let mut left = 0;
    for file in files.iter().rev() {
        if file.is_dir() {
            if std::fs::remove_dir(file).is_ok() {
                debug!("Rolled back directory {}", file.display());
            }
            continue;
        }
        match std::fs::remove_file(file) {
            Ok(()) => debug!("Rolled back {}", file.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Cannot roll back {}: {}", file.display(), e);
                left += 1;
            }
        }
    }
    left
}

/// Local file name for a download
fn artifact_file_name(id: &str, url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() && !name.contains(':') => name.to_string(),
        _ => format!("{}.{}", id.replace(['/', '\\'], "_"), resolver::ARCHIVE_EXTENSION),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_transitions() {
        use GroupState::*;
        assert!(Pending.can_advance(Downloading));
        assert!(Installing.can_advance(Downloading));
        assert!(Installing.can_advance(Installed));
        assert!(Installed.can_advance(RolledBack));
        assert!(Verified.can_advance(Failed));
        assert!(!Pending.can_advance(Installed));
        assert!(!RolledBack.can_advance(Failed));
        assert!(!Installed.can_advance(Downloading));
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name("a", "https://repo/x/a-1.0.esa?t=1"), "a-1.0.esa");
        assert_eq!(artifact_file_name("com/x", "https://repo/"), "com_x.esa");
    }

    #[test]
    fn test_order_fixes_keeps_feature_slots() {
        let base = Arc::new(FixDescriptor::new("base").with_problems(["P1"]).with_files(["f"]));
        let later = Arc::new(FixDescriptor::new("later").with_problems(["P2"]).with_files(["f"]));
        let feature = ResolvedAsset::feature(Arc::new(FeatureDescriptor::new("feat")), "/tmp/feat.esa");

        let mut group = InstallGroup::with_assets(
            "g",
            vec![
                ResolvedAsset::fix(Arc::clone(&later), "/tmp/later.esa"),
                feature,
                ResolvedAsset::fix(Arc::clone(&base), "/tmp/base.esa"),
            ],
        );
        order_fixes(&mut group);
        let ids: Vec<&str> = group.assets().iter().map(ResolvedAsset::id).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1], "feat");
    }
}
