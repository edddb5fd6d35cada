// src/commands/remove.rs
//! Removal planning against the registry

use super::open_registry;
use anyhow::Result;
use esa_install::db::models::InstalledFeature;
use esa_install::uninstall::{self, InstallDependents, RemovalOptions};
use esa_install::{EngineConfig, Error};
use tracing::info;

/// Print the removal order for `features`, or what blocks them
pub fn cmd_plan_removal(
    config: &EngineConfig,
    features: &[String],
    force: bool,
    ignore_dependents: &[String],
    strict: bool,
) -> Result<()> {
    let Some(conn) = open_registry(config)? else {
        println!("No features are installed under {}", config.install_root.display());
        return Ok(());
    };
    let installed = InstalledFeature::list_descriptors(&conn)?;
    info!("Planning removal of {} ({} installed)", features.join(", "), installed.len());

    let options = RemovalOptions {
        force,
        checking: false,
        install_dependents: if strict {
            InstallDependents::ConsiderAll
        } else {
            InstallDependents::from_allow_list(ignore_dependents.iter().cloned())
        },
    };

    let plan = uninstall::plan_removal(features, &installed, &options).inspect_err(|e| {
        if let Error::DependencyBlocked { feature, blockers } = e {
            println!("Cannot remove {}: required by {}", feature, blockers.join(", "));
        }
    })?;

    if plan.order.is_empty() {
        println!("Nothing to remove.");
    } else {
        println!("Removal order:");
        for (index, candidate) in plan.order.iter().enumerate() {
            println!("  {}. {}", index + 1, candidate);
        }
    }

    for (feature, blockers) in &plan.blocked {
        println!("Skipped {} (required by {})", feature, blockers.join(", "));
    }

    Ok(())
}
