// src/db/models/mod.rs

//! Registry row types

mod feature;
mod file;
mod fix;

pub use feature::InstalledFeature;
pub use file::{InstalledFile, OwnerKind};
pub use fix::InstalledFix;
