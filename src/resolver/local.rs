// src/resolver/local.rs

//! Offline transitive feature resolution against a directory of archives
//!
//! Resolution looks for `<name>.esa` first and falls back to scanning every
//! `*.esa` in the directory (sorted by file name) until a descriptor whose
//! symbolic or short name matches is found. Parsing failures only skip the
//! candidate. Features already installed are neither returned nor walked.

use super::cache::{CachedArchive, Lookup, ResolutionCache};
use crate::asset::{InstallGroup, InstallPlan, ResolvedAsset};
use crate::descriptor::{Descriptor, FeatureDescriptor, ProductInfo};
use crate::error::{Error, Result};
use crate::manifest::ManifestReader;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Archive file extension
pub const ARCHIVE_EXTENSION: &str = "esa";

/// Output of one walk
#[derive(Debug, Default, Clone)]
pub struct LocalResolution {
    /// Install order: every dependency precedes its dependents
    pub assets: Vec<ResolvedAsset>,
    /// Names left for the repository resolver
    pub unresolved: Vec<String>,
}

impl LocalResolution {
    pub fn asset_ids(&self) -> Vec<&str> {
        self.assets.iter().map(ResolvedAsset::id).collect()
    }
}

/// Multi-name resolution grouped for the transaction orchestrator
#[derive(Debug, Default)]
pub struct ResolvedPlan {
    pub plan: InstallPlan,
    pub unresolved: Vec<String>,
}

/// Recursive directory resolver with per-instance memoization
pub struct LocalResolver<R> {
    reader: R,
    cache: ResolutionCache,
    products: Vec<ProductInfo>,
    installed: HashSet<String>,
    installed_short: HashSet<String>,
}

impl<R: ManifestReader> LocalResolver<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            cache: ResolutionCache::new(),
            products: Vec::new(),
            installed: HashSet::new(),
            installed_short: HashSet::new(),
        }
    }

    /// Products the resolved features have to apply to
    pub fn with_products(mut self, products: Vec<ProductInfo>) -> Self {
        self.products = products;
        self
    }

    pub fn set_products(&mut self, products: Vec<ProductInfo>) {
        self.products = products;
    }

    pub fn products(&self) -> &[ProductInfo] {
        &self.products
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Features already present in the runtime
    pub fn with_installed<'a, I>(mut self, installed: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureDescriptor>,
    {
        self.set_installed(installed);
        self
    }

    pub fn set_installed<'a, I>(&mut self, installed: I)
    where
        I: IntoIterator<Item = &'a FeatureDescriptor>,
    {
        self.installed.clear();
        self.installed_short.clear();
        for feature in installed {
            self.installed.insert(feature.symbolic_name().to_string());
            if let Some(short) = feature.short_name() {
                self.installed_short.insert(short.to_ascii_lowercase());
            }
        }
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed.contains(name) || self.installed_short.contains(&name.to_ascii_lowercase())
    }

    /// Resolve `feature_id` and everything it requires from `candidate_dir`
    ///
    /// With `allow_network_fallback`, names that cannot be found (or do not
    /// apply to the product) below the root are returned as unresolved
    /// instead of failing the walk. The root itself failing applicability is
    /// always an error.
    pub fn resolve(
        &mut self,
        feature_id: &str,
        candidate_dir: &Path,
        allow_network_fallback: bool,
    ) -> Result<LocalResolution> {
        let dir = normalize_dir(candidate_dir)?;
        let mut visited = HashSet::new();
        let mut out = LocalResolution::default();
        self.walk(feature_id, &dir, allow_network_fallback, true, &mut visited, &mut out)?;
        debug!(
            "Resolved {} from {}: {} assets, {} unresolved",
            feature_id,
            dir.display(),
            out.assets.len(),
            out.unresolved.len()
        );
        Ok(out)
    }

    /// Resolve several names into one group each
    ///
    /// An asset pulled in by an earlier group is not repeated in a later one.
    pub fn resolve_all(
        &mut self,
        names: &[String],
        candidate_dir: &Path,
        allow_network_fallback: bool,
    ) -> Result<ResolvedPlan> {
        if names.is_empty() {
            return Err(Error::BadArgument("no features requested".to_string()));
        }

        let dir = normalize_dir(candidate_dir)?;
        let mut visited = HashSet::new();
        let mut result = ResolvedPlan::default();

        for name in names {
            let mut out = LocalResolution::default();
            self.walk(name, &dir, allow_network_fallback, true, &mut visited, &mut out)?;
            for unresolved in out.unresolved {
                if !result.unresolved.contains(&unresolved) {
                    result.unresolved.push(unresolved);
                }
            }
            result.plan.push_group(InstallGroup::with_assets(name.clone(), out.assets));
        }

        info!(
            "Resolved {} requested features into {} assets",
            names.len(),
            result.plan.asset_count()
        );
        Ok(result)
    }

    /// Every auto-feature archive in `candidate_dir` that is not installed yet
    pub fn auto_candidates(&mut self, candidate_dir: &Path) -> Result<Vec<ResolvedAsset>> {
        let dir = normalize_dir(candidate_dir)?;
        let mut found = Vec::new();
        for path in list_archives(&dir)? {
            if let CachedArchive::Feature(descriptor) = self.load(&path)
                && descriptor.is_auto_feature()
                && !self.is_installed(descriptor.symbolic_name())
            {
                found.push(ResolvedAsset::feature(descriptor, path));
            }
        }
        Ok(found)
    }

    /// Locate `name` in `dir` without recursing
    ///
    /// Names are plain identifiers; anything that could address a path
    /// outside `dir` is rejected.
    pub fn find(&mut self, name: &str, dir: &Path) -> Result<Lookup> {
        check_name(name)?;
        if let Some((path, descriptor)) = self.cache.lookup_name(name, dir) {
            return Ok(Lookup::Resolved(path, descriptor));
        }

        let direct = dir.join(format!("{name}.{ARCHIVE_EXTENSION}"));
        let mut direct_failure = None;
        if direct.is_file() {
            match self.load(&direct) {
                CachedArchive::Feature(descriptor) if descriptor.matches_name(name) => {
                    return Ok(Lookup::Resolved(direct, descriptor));
                }
                CachedArchive::Invalid(reason) => direct_failure = Some(reason),
                _ => {}
            }
        }

        for path in list_archives(dir)? {
            if path == direct {
                continue;
            }
            if let CachedArchive::Feature(descriptor) = self.load(&path)
                && descriptor.matches_name(name)
            {
                return Ok(Lookup::Resolved(path, descriptor));
            }
        }

        Ok(match direct_failure {
            Some(reason) => Lookup::Invalid { path: direct, reason },
            None => Lookup::Unresolved,
        })
    }

    fn load(&mut self, path: &Path) -> CachedArchive {
        if let Some(cached) = self.cache.get(path) {
            return cached.clone();
        }

        let archive = match self.reader.parse(path) {
            Ok(Descriptor::Feature(f)) => CachedArchive::Feature(Arc::new(f)),
            Ok(Descriptor::Fix(f)) => CachedArchive::NotAFeature(f.id().to_string()),
            Err(e) => {
                warn!("Skipping candidate {}: {}", path.display(), e);
                CachedArchive::Invalid(e.to_string())
            }
        };
        self.cache.record(path.to_path_buf(), archive.clone());
        archive
    }

    fn walk(
        &mut self,
        name: &str,
        dir: &Path,
        allow_network: bool,
        is_root: bool,
        visited: &mut HashSet<String>,
        out: &mut LocalResolution,
    ) -> Result<()> {
        if self.is_installed(name) {
            debug!("{} is already installed", name);
            return Ok(());
        }

        let (path, descriptor) = match self.find(name, dir)? {
            Lookup::Resolved(path, descriptor) => (path, descriptor),
            Lookup::Unresolved => {
                return self.unresolved(name, dir, allow_network, visited, out);
            }
            Lookup::Invalid { path, reason } => {
                if is_root && !allow_network {
                    return Err(Error::BadFeatureDefinition { path, reason });
                }
                return self.unresolved(name, dir, allow_network, visited, out);
            }
        };

        let symbolic = descriptor.symbolic_name().to_string();
        if self.installed.contains(&symbolic) || !visited.insert(symbolic.clone()) {
            return Ok(());
        }
        visited.insert(name.to_string());

        if let Err(reason) = descriptor.check_applicability(&self.products) {
            if is_root || !allow_network {
                return Err(Error::NotValidForProduct { name: symbolic, reason });
            }
            warn!("{} does not apply to this product ({}), deferring to repository", symbolic, reason);
            out.unresolved.push(name.to_string());
            return Ok(());
        }

        for required in descriptor.required_features() {
            if visited.contains(required) {
                continue;
            }
            self.walk(required, dir, allow_network, false, visited, out)?;
        }

        out.assets.push(ResolvedAsset::feature(descriptor, path));
        Ok(())
    }

    fn unresolved(
        &self,
        name: &str,
        dir: &Path,
        allow_network: bool,
        visited: &mut HashSet<String>,
        out: &mut LocalResolution,
    ) -> Result<()> {
        if !allow_network {
            return Err(Error::MissingContent {
                name: name.to_string(),
                directory: dir.to_path_buf(),
            });
        }
        if visited.insert(name.to_string()) {
            debug!("{} not found locally, leaving for repository resolution", name);
            out.unresolved.push(name.to_string());
        }
        Ok(())
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::BadArgument(format!("invalid feature name {name:?}")));
    }
    Ok(())
}

fn normalize_dir(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::BadArgument(format!(
            "{} is not a directory",
            dir.display()
        )));
    }
    Ok(std::fs::canonicalize(dir)?)
}

/// `*.esa` files in `dir`, sorted by file name
pub fn list_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut archives: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == ARCHIVE_EXTENSION))
        .collect();
    archives.sort();
    Ok(archives)
}
