// src/commands/resolve.rs
//! Offline resolution against a directory of archives

use super::{open_registry, parse_product};
use crate::cli::ProductArgs;
use anyhow::{Context, Result};
use esa_install::db::models::InstalledFeature;
use esa_install::resolver::{self, LocalResolver};
use esa_install::space::format_size;
use esa_install::{EngineConfig, ResolvedAsset, TomlManifestReader};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Walk `dir` for `features` and print the install order
pub fn cmd_resolve(
    config: &EngineConfig,
    features: &[String],
    dir: &Path,
    allow_network: bool,
    no_auto: bool,
    products: &ProductArgs,
) -> Result<()> {
    let products = products
        .products
        .iter()
        .map(|spec| parse_product(spec))
        .collect::<Result<Vec<_>>>()?;

    let installed = match open_registry(config)? {
        Some(conn) => InstalledFeature::list_descriptors(&conn)?,
        None => Vec::new(),
    };
    info!(
        "Resolving {} against {} ({} features installed)",
        features.join(", "),
        dir.display(),
        installed.len()
    );

    let mut resolver = LocalResolver::new(TomlManifestReader::new())
        .with_products(products)
        .with_installed(installed.iter().map(Arc::as_ref));
    let resolved = resolver
        .resolve_all(features, dir, allow_network)
        .with_context(|| format!("Failed to resolve from {}", dir.display()))?;

    if resolved.plan.is_empty() {
        println!("Nothing to install: every requested feature is already present.");
    } else {
        println!("Install order:");
        for group in resolved.plan.groups() {
            println!("  [{}]", group.name());
            for asset in group.assets() {
                println!("    {} ({})", asset.id(), format_size(asset.size()));
            }
        }
        println!(
            "Total: {} assets, {}",
            resolved.plan.asset_count(),
            format_size(resolved.plan.total_size())
        );
    }

    if !no_auto {
        let candidates = resolver.auto_candidates(dir)?;
        let selected: Vec<ResolvedAsset> = resolved.plan.assets().cloned().collect();
        let activated = resolver::activate(candidates, installed.iter().map(Arc::as_ref), &selected);
        if !activated.is_empty() {
            println!("Auto-features activated:");
            for auto in &activated {
                println!("  {}", auto.id());
            }
        }
    }

    if !resolved.unresolved.is_empty() {
        println!("Unresolved (left for the repository):");
        for name in &resolved.unresolved {
            println!("  {}", name);
        }
    }

    Ok(())
}
