// src/lib.rs

//! esa-install provisioning core
//!
//! Resolves features and fixes from local directories or a repository,
//! verifies and installs them in transactional groups, and removes them
//! again in dependency-safe order.
//!
//! # Architecture
//!
//! - Registry-first: installed features, fixes and their files live in SQLite
//! - Install groups: a failure rolls back the group (or the whole transaction)
//! - Seams: archive parsing ([`ManifestReader`]), extraction
//!   ([`ExtractionEngine`]) and repository lookup ([`RepositoryResolver`])
//!   are supplied by the caller
//! - Integrity: inline or sidecar digests, optional detached OpenPGP signatures

pub mod acquire;
pub mod asset;
pub mod checksums;
pub mod config;
pub mod db;
pub mod descriptor;
mod error;
pub mod fixes;
pub mod hash;
pub mod manifest;
pub mod progress;
pub mod resolver;
pub mod space;
pub mod transaction;
pub mod uninstall;

pub use asset::{AssetPayload, AssetSource, AssetState, InstallGroup, InstallPlan, ResolvedAsset};
pub use config::EngineConfig;
pub use descriptor::{
    CapabilityClause, Constituent, Descriptor, FeatureDescriptor, FixDescriptor, InstallPolicy,
    ProductInfo, ProductMatcher, Visibility,
};
pub use error::{Error, Result};
pub use hash::{HashAlgorithm, Hasher};
pub use manifest::{ManifestReader, TomlManifestReader};
pub use progress::{
    CallbackListener, CancelToken, InstallListener, ListenerAction, LogListener, ProgressEvent,
    ProgressState,
};
pub use resolver::{LocalResolver, RepositoryResolver, ResolutionPolicy, ResourceHandle};
pub use transaction::{
    Director, ExtractionEngine, GroupState, InstallContext, InstallReport, UninstallReport,
};
pub use uninstall::{InstallDependents, RemovalOptions, UninstallTarget};
