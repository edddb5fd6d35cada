// src/transaction/removal.rs

//! Uninstall side of the orchestrator
//!
//! Every target is probed for file locks before anything is touched. Targets
//! are then removed in planned order; the first failure stops the batch, but
//! files the engine already restored stay recorded and still get their
//! permission fix-up.

use super::Director;
use super::engine::InstallContext;
use super::permissions::{self, PermissionFailure};
use crate::db::models::{InstalledFile, OwnerKind};
use crate::error::{Error, Result};
use crate::fixes;
use crate::manifest::ManifestReader;
use crate::progress::{self, ProgressEvent, ProgressState};
use crate::uninstall::{self, RemovalOptions, UninstallTarget};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Summary of an uninstall
#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    pub transaction_id: String,
    /// Removed ids, in removal order
    pub removed: Vec<String>,
    /// Targets dropped under `force`, with their blockers
    pub blocked: BTreeMap<String, Vec<String>>,
    /// Files recorded for the removed targets
    pub removed_files: Vec<PathBuf>,
    /// Files the engine restored to an earlier state
    pub restored_files: Vec<PathBuf>,
    pub permission_failures: Vec<PermissionFailure>,
    pub fingerprint: Option<String>,
    pub completed: bool,
}

fn owner_kind(target: &UninstallTarget) -> OwnerKind {
    match target {
        UninstallTarget::Feature(_) => OwnerKind::Feature,
        UninstallTarget::Fix(_) => OwnerKind::Fix,
    }
}

impl<R: ManifestReader> Director<R> {
    /// Remove features, dependents first
    pub fn uninstall_features(
        &mut self,
        names: &[String],
        options: &RemovalOptions,
    ) -> Result<UninstallReport> {
        self.uninstall(names, &[], options)
    }

    /// Remove fixes after checking that no remaining fix depends on them
    pub fn uninstall_fixes(&mut self, ids: &[String]) -> Result<UninstallReport> {
        self.uninstall(&[], ids, &RemovalOptions::default())
    }

    /// Remove fixes, then features, in one batch
    pub fn uninstall(
        &mut self,
        features: &[String],
        fix_ids: &[String],
        options: &RemovalOptions,
    ) -> Result<UninstallReport> {
        if features.is_empty() && fix_ids.is_empty() {
            return Err(Error::BadArgument("nothing to uninstall".to_string()));
        }

        let mut targets = Vec::new();
        if !fix_ids.is_empty() {
            let installed = self.installed_fixes()?;
            targets.extend(
                fixes::plan_fix_removal(fix_ids, &installed)?
                    .into_iter()
                    .map(UninstallTarget::Fix),
            );
        }

        let mut blocked = BTreeMap::new();
        if !features.is_empty() {
            let installed = self.installed_features()?;
            let plan = uninstall::plan_removal(features, &installed, options)?;
            targets.extend(plan.order.iter().map(|c| c.target().clone()));
            blocked = plan.blocked;
        }

        self.remove_targets(targets, blocked)
    }

    fn remove_targets(
        &mut self,
        targets: Vec<UninstallTarget>,
        blocked: BTreeMap<String, Vec<String>>,
    ) -> Result<UninstallReport> {
        self.reporter.cancel_token().reset();
        let mut report = UninstallReport {
            transaction_id: Uuid::new_v4().to_string(),
            blocked,
            ..UninstallReport::default()
        };

        if targets.is_empty() {
            info!("Nothing left to remove after dropping blocked targets");
            report.completed = true;
            self.last_uninstall = Some(report.clone());
            return Ok(report);
        }

        let mut recorded = Vec::with_capacity(targets.len());
        for target in &targets {
            let files = InstalledFile::files_for(&self.conn, owner_kind(target), target.id())?;
            for file in &files {
                self.lock_probe.ensure_unlocked(file)?;
            }
            recorded.push(files);
        }
        debug!("Lock check passed for {} targets", targets.len());

        let mut ctx = InstallContext::new(&self.config.install_root);
        let total = targets.len();
        for (index, (target, files)) in targets.iter().zip(&recorded).enumerate() {
            match self.remove_one(target, files, &mut ctx, index, total) {
                Ok(restored) => {
                    report.removed.push(target.id().to_string());
                    report.removed_files.extend(files.iter().cloned());
                    report.restored_files.extend(restored);
                }
                Err(e) => {
                    if e.is_cancellation() {
                        info!("Uninstall cancelled: {}", e);
                    } else {
                        error!("Removing {} failed: {}", target.id(), e);
                    }
                    report.permission_failures = permissions::apply(&mut ctx);
                    self.last_uninstall = Some(report);
                    return Err(e);
                }
            }
        }

        report.permission_failures = permissions::apply(&mut ctx);
        self.notify(ProgressEvent::new(
            ProgressState::CleaningUp,
            progress::CLEANUP_PERCENT,
            "Committing checksums",
        ));
        let mut touched = report.removed_files.clone();
        touched.extend(report.restored_files.iter().cloned());
        report.fingerprint = Some(self.commit(&touched)?);
        report.completed = true;

        self.notify(ProgressEvent::new(
            ProgressState::Complete,
            progress::COMPLETE_PERCENT,
            format!("Removed {}", report.removed.join(", ")),
        ));
        self.last_uninstall = Some(report.clone());
        Ok(report)
    }

    fn remove_one(
        &mut self,
        target: &UninstallTarget,
        files: &[PathBuf],
        ctx: &mut InstallContext,
        index: usize,
        total: usize,
    ) -> Result<Vec<PathBuf>> {
        self.reporter.report(
            ProgressEvent::new(
                ProgressState::Uninstalling,
                progress::install_percent(index, total),
                format!("Removing {}", target.id()),
            )
            .for_asset(target.id()),
        )?;

        let restored = self.engine.uninstall(target, files, ctx)?;
        ctx.track(restored.iter().cloned());
        self.forget(owner_kind(target), target.id())?;
        info!("Uninstalled {} {}", owner_kind(target), target.id());
        Ok(restored)
    }
}
