// src/acquire/lock.rs

//! File-lock probe
//!
//! A file held open by another process cannot be renamed on some platforms.
//! Renaming a file onto itself is harmless everywhere, so a failing
//! rename-to-self is taken as "locked". The probe retries a few times before
//! giving up.

use crate::error::{Error, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct LockProbe {
    attempts: u32,
    backoff: Duration,
}

impl Default for LockProbe {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl LockProbe {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// True if `path` exists and stays unrenameable for every attempt
    pub fn is_locked(&self, path: &Path) -> bool {
        if !path.exists() {
            return false;
        }
        for attempt in 1..=self.attempts {
            match std::fs::rename(path, path) {
                Ok(()) => return false,
                Err(e) => {
                    debug!("Lock probe {} of {} on {}: {}", attempt, self.attempts, path.display(), e);
                    if attempt < self.attempts {
                        std::thread::sleep(self.backoff);
                    }
                }
            }
        }
        warn!("{} appears to be locked", path.display());
        true
    }

    pub fn ensure_unlocked(&self, path: &Path) -> Result<()> {
        if self.is_locked(path) {
            return Err(Error::FileLocked(path.to_path_buf()));
        }
        Ok(())
    }
}
