// src/resolver/auto.rs

//! Fixed-point activation of auto-features
//!
//! An auto-feature with the `when-satisfied` policy is pulled into an install
//! once every one of its capability clauses names a feature that is installed,
//! selected, or already activated. Activation can enable further candidates,
//! so passes repeat until one activates nothing.

use crate::asset::ResolvedAsset;
use crate::descriptor::{CapabilityClause, FeatureDescriptor, InstallPolicy};
use std::collections::HashSet;
use tracing::debug;

/// Names present in the runtime, matched like descriptor names
#[derive(Debug, Default, Clone)]
pub struct PresentFeatures {
    symbolic: HashSet<String>,
    short: HashSet<String>,
}

impl PresentFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, feature: &FeatureDescriptor) {
        self.symbolic.insert(feature.symbolic_name().to_string());
        if let Some(short) = feature.short_name() {
            self.short.insert(short.to_ascii_lowercase());
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbolic.contains(name) || self.short.contains(&name.to_ascii_lowercase())
    }

    pub fn is_satisfied(&self, clause: &CapabilityClause) -> bool {
        clause.names().iter().any(|n| self.contains(n))
    }

    pub fn len(&self) -> usize {
        self.symbolic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbolic.is_empty()
    }
}

/// True when `feature` is an auto-feature waiting on its capability
pub fn is_eligible(feature: &FeatureDescriptor) -> bool {
    feature.is_auto_feature() && feature.install_policy() == InstallPolicy::WhenSatisfied
}

/// Activate every candidate whose capability requirement becomes satisfied
///
/// `baseline` is the installed set and `selected` the assets already chosen
/// for this install. Returned assets keep activation order, which follows
/// pass number and then original candidate order. Candidates that are never
/// satisfied are dropped.
pub fn activate<'a, I>(
    candidates: Vec<ResolvedAsset>,
    baseline: I,
    selected: &[ResolvedAsset],
) -> Vec<ResolvedAsset>
where
    I: IntoIterator<Item = &'a FeatureDescriptor>,
{
    let mut present = PresentFeatures::new();
    for feature in baseline {
        present.add(feature);
    }
    for feature in selected.iter().filter_map(ResolvedAsset::feature_descriptor) {
        present.add(feature);
    }

    let mut pending: Vec<ResolvedAsset> = candidates
        .into_iter()
        .filter(|asset| match asset.feature_descriptor() {
            Some(f) if is_eligible(f) => !present.contains(f.symbolic_name()),
            Some(f) => {
                debug!("{} is not a when-satisfied auto-feature, skipping", f.symbolic_name());
                false
            }
            None => false,
        })
        .collect();

    let mut activated = Vec::new();
    let mut pass = 0;
    loop {
        pass += 1;
        let mut progressed = false;
        let mut remaining = Vec::with_capacity(pending.len());

        for asset in pending {
            let satisfied = asset
                .feature_descriptor()
                .is_some_and(|f| f.provision_capability().iter().all(|c| present.is_satisfied(c)));
            if satisfied {
                if let Some(f) = asset.feature_descriptor() {
                    debug!("Activating auto-feature {} in pass {}", f.symbolic_name(), pass);
                    present.add(f);
                }
                activated.push(asset);
                progressed = true;
            } else {
                remaining.push(asset);
            }
        }

        pending = remaining;
        if !progressed || pending.is_empty() {
            break;
        }
    }

    for asset in &pending {
        debug!("Auto-feature {} not satisfied, dropping", asset.id());
    }
    activated
}
