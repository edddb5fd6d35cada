// src/commands/space.rs
//! Disk-space preflight for a directory of artifacts

use anyhow::Result;
use esa_install::EngineConfig;
use esa_install::space::{self, format_size};
use std::path::Path;

pub fn cmd_space(config: &EngineConfig, dir: &Path, target: Option<&Path>) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let target = target.unwrap_or(&config.install_root);
    let required = space::directory_size(dir);
    let available = space::available_space(target)?;

    println!("Required:  {}", format_size(required));
    println!("Available: {} on {}", format_size(available), target.display());
    space::check_space(target, required)?;
    println!("Enough space to install.");
    Ok(())
}
