// src/uninstall.rs

//! Safe removal planning for installed features
//!
//! Two steps. First every target is checked for surviving dependents: a
//! private or protected dependent is walked upward until a public or install
//! ancestor is found, and only that ancestor is reported as a blocker. Then
//! the surviving targets are ordered so that a dependent is always removed
//! before anything it requires.

use crate::descriptor::{FeatureDescriptor, FixDescriptor, Visibility};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How INSTALL-visibility dependents are treated by the blocking check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum InstallDependents {
    /// Never block on INSTALL dependents
    #[default]
    IgnoreAll,
    /// Ignore only the listed INSTALL dependents
    IgnoreListed(HashSet<String>),
    /// Every INSTALL dependent blocks
    ConsiderAll,
}

impl InstallDependents {
    /// Build from an allow list where an empty list means "ignore all"
    pub fn from_allow_list<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: HashSet<String> = names.into_iter().map(Into::into).collect();
        if set.is_empty() {
            InstallDependents::IgnoreAll
        } else {
            InstallDependents::IgnoreListed(set)
        }
    }

    fn ignores(&self, feature: &FeatureDescriptor) -> bool {
        match self {
            InstallDependents::IgnoreAll => true,
            InstallDependents::ConsiderAll => false,
            InstallDependents::IgnoreListed(names) => names.iter().any(|n| feature.matches_name(n)),
        }
    }
}

/// Options for [`plan_removal`]
#[derive(Debug, Clone, Default)]
pub struct RemovalOptions {
    /// Drop blocked targets instead of failing
    pub force: bool,
    /// Pre-flight pass: INSTALL dependents never block
    pub checking: bool,
    pub install_dependents: InstallDependents,
}

/// What is being removed
#[derive(Debug, Clone)]
pub enum UninstallTarget {
    Feature(Arc<FeatureDescriptor>),
    Fix(Arc<FixDescriptor>),
}

impl UninstallTarget {
    pub fn id(&self) -> &str {
        match self {
            UninstallTarget::Feature(f) => f.symbolic_name(),
            UninstallTarget::Fix(f) => f.id(),
        }
    }
}

/// A removal target plus its sort key
#[derive(Debug, Clone)]
pub struct UninstallCandidate {
    target: UninstallTarget,
    order: i64,
}

impl UninstallCandidate {
    pub fn new(target: UninstallTarget, order: i64) -> Self {
        Self { target, order }
    }

    pub fn target(&self) -> &UninstallTarget {
        &self.target
    }

    pub fn id(&self) -> &str {
        self.target.id()
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn feature(&self) -> Option<&Arc<FeatureDescriptor>> {
        match &self.target {
            UninstallTarget::Feature(f) => Some(f),
            UninstallTarget::Fix(_) => None,
        }
    }
}

impl PartialEq for UninstallCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for UninstallCandidate {}

impl fmt::Display for UninstallCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id(), self.order)
    }
}

/// Output of [`plan_removal`]
#[derive(Debug, Clone, Default)]
pub struct RemovalPlan {
    /// Removal order: dependents before their dependencies
    pub order: Vec<UninstallCandidate>,
    /// Targets dropped under `force`, with the names that blocked them
    pub blocked: BTreeMap<String, Vec<String>>,
}

impl RemovalPlan {
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(UninstallCandidate::id).collect()
    }
}

/// Reverse requires-edges of the installed set
///
/// Requirements may name a feature by its short name; edges are keyed by the
/// installed feature's symbolic name.
struct DependentIndex<'a> {
    by_name: HashMap<&'a str, &'a Arc<FeatureDescriptor>>,
    dependents: HashMap<&'a str, Vec<&'a Arc<FeatureDescriptor>>>,
}

impl<'a> DependentIndex<'a> {
    fn build(installed: &'a [Arc<FeatureDescriptor>]) -> Self {
        let mut index = Self {
            by_name: installed.iter().map(|f| (f.symbolic_name(), f)).collect(),
            dependents: HashMap::new(),
        };
        for feature in installed {
            for required in feature.required_features() {
                let key = index.canonical(required);
                index.dependents.entry(key).or_default().push(feature);
            }
        }
        index
    }

    fn find(&self, name: &str) -> Option<&'a Arc<FeatureDescriptor>> {
        self.by_name.get(name).copied().or_else(|| {
            self.by_name
                .values()
                .find(|f| f.matches_name(name))
                .copied()
        })
    }

    /// Symbolic name of the installed feature `name` refers to
    fn canonical(&self, name: &'a str) -> &'a str {
        self.find(name).map_or(name, |f| f.symbolic_name())
    }

    fn len(&self) -> usize {
        self.by_name.len()
    }

    fn dependents_of(&self, name: &str) -> &[&'a Arc<FeatureDescriptor>] {
        self.dependents.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Public or install features that keep `target` alive
fn find_blockers(
    target: &str,
    targets: &BTreeSet<String>,
    index: &DependentIndex<'_>,
    options: &RemovalOptions,
) -> Vec<String> {
    let mut blockers = BTreeSet::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&Arc<FeatureDescriptor>> = index.dependents_of(target).to_vec();

    while let Some(dependent) = stack.pop() {
        let name = dependent.symbolic_name();
        if !seen.insert(name) || targets.contains(name) {
            continue;
        }

        match dependent.visibility() {
            Visibility::Public => {
                blockers.insert(dependent.display_name().to_string());
            }
            Visibility::Install => {
                if options.checking || options.install_dependents.ignores(dependent) {
                    debug!("Ignoring install dependent {} of {}", name, target);
                } else {
                    blockers.insert(dependent.display_name().to_string());
                }
            }
            Visibility::Private | Visibility::Protected => {
                stack.extend(index.dependents_of(name).iter().copied());
            }
        }
    }

    blockers.into_iter().collect()
}

/// Decide which targets may be removed and in which order
///
/// Targets are matched by symbolic name or short name. Without `force`, the
/// first blocked target (by symbolic name) fails the whole plan.
pub fn plan_removal(
    targets: &[String],
    installed: &[Arc<FeatureDescriptor>],
    options: &RemovalOptions,
) -> Result<RemovalPlan> {
    if targets.is_empty() {
        return Err(Error::BadArgument("no features to uninstall".to_string()));
    }

    let index = DependentIndex::build(installed);
    let mut remaining = BTreeSet::new();
    for name in targets {
        let feature = index
            .find(name)
            .ok_or_else(|| Error::BadArgument(format!("feature {name} is not installed")))?;
        remaining.insert(feature.symbolic_name().to_string());
    }

    let mut plan = RemovalPlan::default();

    // Dropping one blocked target can expose a new blocker for another one
    loop {
        let mut dropped = Vec::new();
        for target in &remaining {
            let blockers = find_blockers(target, &remaining, &index, options);
            if blockers.is_empty() {
                continue;
            }
            let target_name = index
                .find(target)
                .map(|f| f.display_name().to_string())
                .unwrap_or_else(|| target.clone());
            if !options.force {
                return Err(Error::DependencyBlocked {
                    feature: target_name,
                    blockers,
                });
            }
            warn!("Not removing {}: required by {}", target_name, blockers.join(", "));
            plan.blocked.insert(target.clone(), blockers);
            dropped.push(target.clone());
        }
        if dropped.is_empty() {
            break;
        }
        for target in dropped {
            remaining.remove(&target);
        }
    }

    plan.order = order_features(&remaining, &index);
    info!(
        "Planned removal of {} features ({} blocked)",
        plan.order.len(),
        plan.blocked.len()
    );
    Ok(plan)
}

/// Depth-first post-order with a descending counter, then ascending sort
///
/// The walk follows requirements through features outside the batch too, so
/// a dependent also precedes what it needs transitively.
fn order_features(targets: &BTreeSet<String>, index: &DependentIndex<'_>) -> Vec<UninstallCandidate> {
    let mut keys: HashMap<&str, i64> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut counter = index.len() as i64;

    for name in targets {
        if let Some(feature) = index.find(name) {
            assign_keys(feature.symbolic_name(), index, &mut visited, &mut keys, &mut counter);
        }
    }

    let mut order: Vec<UninstallCandidate> = targets
        .iter()
        .filter_map(|name| {
            let feature = index.find(name)?;
            let key = keys.get(feature.symbolic_name()).copied().unwrap_or(0);
            Some(UninstallCandidate::new(
                UninstallTarget::Feature(Arc::clone(feature)),
                key,
            ))
        })
        .collect();
    order.sort_by_key(UninstallCandidate::order);
    order
}

fn assign_keys<'a>(
    name: &'a str,
    index: &DependentIndex<'a>,
    visited: &mut HashSet<&'a str>,
    keys: &mut HashMap<&'a str, i64>,
    counter: &mut i64,
) {
    if !visited.insert(name) {
        return;
    }
    if let Some(feature) = index.find(name) {
        for required in feature.required_features() {
            if let Some(dependency) = index.find(required) {
                assign_keys(dependency.symbolic_name(), index, visited, keys, counter);
            }
        }
    }
    keys.insert(name, *counter);
    *counter -= 1;
}
