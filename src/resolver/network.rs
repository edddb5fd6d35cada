// src/resolver/network.rs

//! Repository resolution seam
//!
//! Names the local walker could not satisfy are handed to an external
//! [`RepositoryResolver`]. It answers with groups of [`ResourceHandle`]s,
//! which become pending assets for the acquisition pipeline.

use crate::acquire::IntegrityRecord;
use crate::asset::{AssetPayload, InstallGroup, InstallPlan, ResolvedAsset};
use crate::descriptor::{Descriptor, ProductInfo, Visibility};
use crate::error::Result;
use crate::hash::HashAlgorithm;
use std::fmt;
use std::sync::Arc;

/// Kind of resource a repository can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Feature,
    Fix,
    Sample,
    Other,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceType::Feature => "feature",
            ResourceType::Fix => "fix",
            ResourceType::Sample => "sample",
            ResourceType::Other => "other",
        };
        f.write_str(s)
    }
}

/// One resolved repository resource
#[derive(Debug, Clone)]
pub struct ResourceHandle {
    pub resource_type: ResourceType,
    pub id: String,
    pub visibility: Visibility,
    /// Location of the main attachment
    pub url: String,
    /// SHA-256 of the main attachment, when the repository publishes it
    pub digest: Option<String>,
    pub size: Option<u64>,
    /// Descriptor already known to the repository, if any
    pub descriptor: Option<Descriptor>,
}

impl ResourceHandle {
    pub fn new(resource_type: ResourceType, id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            resource_type,
            id: id.into(),
            visibility: Visibility::Public,
            url: url.into(),
            digest: None,
            size: None,
            descriptor: None,
        }
    }

    pub fn with_digest(mut self, sha256: impl Into<String>) -> Self {
        self.digest = Some(sha256.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    /// Turn the handle into a pending asset
    pub fn into_asset(self) -> ResolvedAsset {
        let mut integrity = IntegrityRecord::default();
        if let Some(digest) = &self.digest {
            integrity = integrity.with_digest(HashAlgorithm::Sha256, digest.clone());
        }

        let payload = match (self.resource_type, self.descriptor) {
            (ResourceType::Feature, Some(Descriptor::Feature(f))) => AssetPayload::Feature(Arc::new(f)),
            (ResourceType::Fix, Some(Descriptor::Fix(f))) => AssetPayload::Fix(Arc::new(f)),
            (kind, _) => AssetPayload::Other {
                id: self.id,
                kind: kind.to_string(),
            },
        };

        ResolvedAsset::pending(payload, self.url, integrity, self.size)
    }
}

/// Constraints passed along with a repository query
#[derive(Debug, Clone, Default)]
pub struct ResolutionPolicy {
    pub products: Vec<ProductInfo>,
    /// Symbolic names already installed
    pub installed: Vec<String>,
}

/// External catalog resolver
pub trait RepositoryResolver {
    /// Resolve `names` into groups of resources, one group per requested name
    fn resolve(&self, names: &[String], policy: &ResolutionPolicy) -> Result<Vec<Vec<ResourceHandle>>>;
}

/// Convert resolver output into install groups named after the request
pub fn into_plan(names: &[String], groups: Vec<Vec<ResourceHandle>>) -> InstallPlan {
    let mut plan = InstallPlan::new();
    for (index, handles) in groups.into_iter().enumerate() {
        let name = names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("group-{index}"));
        let assets = handles.into_iter().map(ResourceHandle::into_asset).collect();
        plan.push_group(InstallGroup::with_assets(name, assets));
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::{AssetSource, AssetState};
    use crate::descriptor::FeatureDescriptor;

    #[test]
    fn test_handle_becomes_pending_asset() {
        let handle = ResourceHandle::new(ResourceType::Feature, "com.example.a", "https://repo/a.esa")
            .with_digest("ab".repeat(32))
            .with_size(42)
            .with_descriptor(Descriptor::Feature(FeatureDescriptor::new("com.example.a")));
        let asset = handle.into_asset();

        assert_eq!(asset.id(), "com.example.a");
        assert!(asset.feature_descriptor().is_some());
        assert_eq!(asset.state(), AssetState::Pending);
        assert_eq!(asset.size(), 42);
        match asset.source() {
            AssetSource::Pending { integrity, .. } => {
                assert!(integrity.digest(HashAlgorithm::Sha256).is_some());
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_sample_without_descriptor_is_other() {
        let asset = ResourceHandle::new(ResourceType::Sample, "sample-app", "https://repo/s.jar").into_asset();
        assert_eq!(asset.payload().kind_name(), "sample");
    }

    #[test]
    fn test_plan_groups_named_after_request() {
        let names = vec!["a".to_string()];
        let groups = vec![
            vec![ResourceHandle::new(ResourceType::Feature, "a", "file:///a.esa")],
            vec![ResourceHandle::new(ResourceType::Other, "x", "file:///x")],
        ];
        let plan = into_plan(&names, groups);
        assert_eq!(plan.groups()[0].name(), "a");
        assert_eq!(plan.groups()[1].name(), "group-1");
    }
}
