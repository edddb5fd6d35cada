// src/resolver/mod.rs

//! Feature resolution
//!
//! Local resolution walks a directory of archives; auto-feature activation
//! extends the result; anything the directory cannot satisfy goes to an
//! external repository resolver.

pub mod auto;
mod cache;
mod local;
pub mod network;

pub use auto::{PresentFeatures, activate};
pub use cache::{CachedArchive, Lookup, ResolutionCache};
pub use local::{ARCHIVE_EXTENSION, LocalResolution, LocalResolver, ResolvedPlan, list_archives};
pub use network::{RepositoryResolver, ResolutionPolicy, ResourceHandle, ResourceType};
