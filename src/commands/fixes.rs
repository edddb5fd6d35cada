// src/commands/fixes.rs
//! Fix removability report

use super::open_registry;
use anyhow::Result;
use esa_install::EngineConfig;
use esa_install::db::models::InstalledFix;
use esa_install::fixes;

/// Print, for each installed fix, whether it can be removed on its own
pub fn cmd_fix_check(config: &EngineConfig, only: &[String]) -> Result<()> {
    let installed = match open_registry(config)? {
        Some(conn) => InstalledFix::list_descriptors(&conn)?,
        None => Vec::new(),
    };
    if installed.is_empty() {
        println!("No fixes are installed.");
        return Ok(());
    }

    for name in only {
        if !installed.iter().any(|f| f.id() == name) {
            anyhow::bail!("Fix {} is not installed", name);
        }
    }

    let mut blocked = 0;
    for (id, conflict) in fixes::removability_report(&installed) {
        if !only.is_empty() && !only.contains(&id) {
            continue;
        }
        match conflict {
            None => println!("  {:<32} removable", id),
            Some(other) => {
                blocked += 1;
                println!("  {:<32} blocked by {}", id, other);
            }
        }
    }

    if blocked > 0 {
        println!("{} fix(es) must be removed together with the fix that blocks them.", blocked);
    }
    Ok(())
}
