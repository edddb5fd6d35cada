// src/commands/mod.rs
//! Command handlers for the esa-install CLI

mod fixes;
mod remove;
mod resolve;
mod space;
mod verify;

pub use fixes::cmd_fix_check;
pub use remove::cmd_plan_removal;
pub use resolve::cmd_resolve;
pub use space::cmd_space;
pub use verify::cmd_verify;

use anyhow::{Context, Result};
use esa_install::EngineConfig;
use esa_install::ProductInfo;
use esa_install::db;
use rusqlite::Connection;
use std::path::Path;
use tracing::debug;

/// Build the engine configuration from `--config`, the environment and `--root`
pub fn load_config(path: Option<&Path>, root: Option<&Path>) -> Result<EngineConfig> {
    let mut config = match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => {
            let mut config = EngineConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
    };
    if let Some(root) = root {
        config.install_root = root.to_path_buf();
    }
    config.validate()?;
    debug!("Install root: {}", config.install_root.display());
    Ok(config)
}

/// Open the registry without creating one
///
/// Returns `None` when nothing was ever installed under this root.
pub fn open_registry(config: &EngineConfig) -> Result<Option<Connection>> {
    let path = config.registry_path();
    if !path.exists() {
        debug!("No registry at {}", path.display());
        return Ok(None);
    }
    let conn = db::open(&path)
        .with_context(|| format!("Failed to open registry {}", path.display()))?;
    Ok(Some(conn))
}

/// Parse `id:version[:edition[:install-type]]`
pub fn parse_product(spec: &str) -> Result<ProductInfo> {
    let mut parts = spec.split(':');
    let id = parts.next().filter(|s| !s.is_empty());
    let version = parts.next().filter(|s| !s.is_empty());
    let (Some(id), Some(version)) = (id, version) else {
        anyhow::bail!("Invalid product '{}', expected id:version[:edition[:install-type]]", spec);
    };

    let mut product = ProductInfo::new(id, version);
    if let Some(edition) = parts.next().filter(|s| !s.is_empty()) {
        product = product.with_edition(edition);
    }
    if let Some(install_type) = parts.next().filter(|s| !s.is_empty()) {
        product = product.with_install_type(install_type);
    }
    if parts.next().is_some() {
        anyhow::bail!("Invalid product '{}': too many fields", spec);
    }
    Ok(product)
}
