// src/resolver/cache.rs

//! Instance-owned memoization for the local resolution walker
//!
//! Every archive is parsed at most once per cache. Successful parses are
//! indexed by absolute path, symbolic name and lowercased short name; failed
//! parses are remembered as invalid so a corrupt candidate is never re-read.

use crate::descriptor::FeatureDescriptor;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What an archive turned out to be
#[derive(Debug, Clone)]
pub enum CachedArchive {
    Feature(Arc<FeatureDescriptor>),
    /// Parsed fine but is not a feature (a fix, for instance)
    NotAFeature(String),
    /// Unreadable or unsupported manifest
    Invalid(String),
}

/// Result of looking a name up in a candidate directory
#[derive(Debug, Clone)]
pub enum Lookup {
    Resolved(PathBuf, Arc<FeatureDescriptor>),
    /// No candidate matches
    Unresolved,
    /// The obvious candidate (`<name>.esa`) exists but could not be parsed
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Default)]
pub struct ResolutionCache {
    by_path: HashMap<PathBuf, CachedArchive>,
    by_name: HashMap<String, (PathBuf, Arc<FeatureDescriptor>)>,
    by_short_name: HashMap<String, String>,
    parses: usize,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&CachedArchive> {
        self.by_path.get(path)
    }

    /// Record the outcome of parsing `path`
    pub fn record(&mut self, path: PathBuf, archive: CachedArchive) {
        self.parses += 1;
        if let CachedArchive::Feature(descriptor) = &archive {
            let name = descriptor.symbolic_name().to_string();
            if let Some(short) = descriptor.short_name() {
                self.by_short_name
                    .entry(short.to_ascii_lowercase())
                    .or_insert_with(|| name.clone());
            }
            self.by_name
                .entry(name)
                .or_insert_with(|| (path.clone(), Arc::clone(descriptor)));
        }
        self.by_path.insert(path, archive);
    }

    /// Find an already-parsed feature by symbolic name or short name
    ///
    /// `directory` restricts hits to archives that live in that directory.
    pub fn lookup_name(&self, name: &str, directory: &Path) -> Option<(PathBuf, Arc<FeatureDescriptor>)> {
        let symbolic = match self.by_name.get(name) {
            Some(_) => name,
            None => self.by_short_name.get(&name.to_ascii_lowercase())?.as_str(),
        };
        let (path, descriptor) = self.by_name.get(symbolic)?;
        if path.parent() == Some(directory) {
            Some((path.clone(), Arc::clone(descriptor)))
        } else {
            None
        }
    }

    pub fn is_invalid(&self, path: &Path) -> bool {
        matches!(self.by_path.get(path), Some(CachedArchive::Invalid(_)))
    }

    /// Number of archives parsed into this cache
    pub fn parse_count(&self) -> usize {
        self.parses
    }

    pub fn invalid_paths(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.by_path.iter().filter_map(|(p, a)| match a {
            CachedArchive::Invalid(reason) => Some((p.as_path(), reason.as_str())),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
        self.by_name.clear();
        self.by_short_name.clear();
        self.parses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_symbolic_and_short_name() {
        let mut cache = ResolutionCache::new();
        let dir = PathBuf::from("/repo");
        let desc = Arc::new(FeatureDescriptor::new("com.example.a").with_short_name("A-1.0"));
        cache.record(dir.join("a.esa"), CachedArchive::Feature(desc));

        assert!(cache.lookup_name("com.example.a", &dir).is_some());
        assert!(cache.lookup_name("a-1.0", &dir).is_some());
        assert!(cache.lookup_name("com.example.a", Path::new("/elsewhere")).is_none());
        assert!(cache.lookup_name("b", &dir).is_none());
    }

    #[test]
    fn test_invalid_is_remembered() {
        let mut cache = ResolutionCache::new();
        let path = PathBuf::from("/repo/bad.esa");
        cache.record(path.clone(), CachedArchive::Invalid("truncated".to_string()));
        assert!(cache.is_invalid(&path));
        assert_eq!(cache.invalid_paths().count(), 1);
        assert_eq!(cache.parse_count(), 1);

        cache.clear();
        assert!(cache.get(&path).is_none());
    }
}
