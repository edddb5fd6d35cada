// src/cli/mod.rs
//! CLI definitions for esa-install
//!
//! The binary is a diagnostic front end over the provisioning core: it can
//! walk a directory of archives, plan removals against the registry, check
//! installed fixes, verify artifacts and run the disk-space preflight.
//! Command implementations live in the `commands` module.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "esa-install")]
#[command(author = "esa-install Contributors")]
#[command(version)]
#[command(about = "Feature and fix provisioning for an installed runtime", long_about = None)]
pub struct Cli {
    /// Engine configuration file (TOML)
    #[arg(short, long, global = true, env = "ESA_INSTALL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Install root, overriding the configuration file
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve features from a directory of archives and print the install order
    Resolve {
        /// Feature symbolic or short names
        #[arg(required = true)]
        features: Vec<String>,

        /// Directory holding the archives
        #[arg(short, long)]
        dir: PathBuf,

        /// Report names missing from the directory instead of failing
        #[arg(long)]
        allow_network: bool,

        /// Skip auto-feature activation
        #[arg(long)]
        no_auto: bool,

        #[command(flatten)]
        products: ProductArgs,
    },

    /// Print the order in which installed features would be removed
    PlanRemoval {
        /// Features to remove
        #[arg(required = true)]
        features: Vec<String>,

        /// Drop blocked features instead of failing
        #[arg(long)]
        force: bool,

        /// INSTALL-visibility dependents that may be ignored (repeatable)
        #[arg(long = "ignore-dependent")]
        ignore_dependents: Vec<String>,

        /// Treat every INSTALL-visibility dependent as blocking
        #[arg(long, conflicts_with = "ignore_dependents")]
        strict: bool,
    },

    /// Report whether each installed fix can be removed
    FixCheck {
        /// Only check these fixes
        fixes: Vec<String>,
    },

    /// Check an artifact against a digest and optionally a detached signature
    Verify {
        /// Artifact to check
        artifact: PathBuf,

        /// Expected digest; sidecar files next to the artifact are used when omitted
        #[arg(long)]
        digest: Option<String>,

        /// Algorithm of --digest (sha256, sha1, md5)
        #[arg(long, default_value = "sha256")]
        algorithm: String,

        /// Detached signature; `<artifact>.asc` is used when present
        #[arg(long)]
        signature: Option<PathBuf>,
    },

    /// Check that a directory of artifacts fits on the install target
    Space {
        /// Directory holding the artifacts
        dir: PathBuf,

        /// Filesystem to check; defaults to the install root
        #[arg(long)]
        target: Option<PathBuf>,
    },
}

/// Product the resolved features must apply to
#[derive(Args, Debug, Clone, Default)]
pub struct ProductArgs {
    /// Installed product as `id:version[:edition[:install-type]]` (repeatable)
    #[arg(long = "product")]
    pub products: Vec<String>,
}
