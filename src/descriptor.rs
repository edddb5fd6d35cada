// src/descriptor.rs

//! Feature and fix descriptors
//!
//! Immutable views of metadata produced by a manifest reader. The core never
//! mutates a descriptor; it only reads names, visibility, constituents and
//! applicability. Identity is the symbolic name (features) or the fix id
//! (fixes), so two descriptors with the same name compare equal even if they
//! were parsed from different archives.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Who may see and depend on a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// User-facing feature, installable by name
    #[default]
    Public,
    /// Installer-only dependency
    Install,
    /// Implementation detail visible to product features
    Protected,
    /// Implementation detail, hidden
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &str {
        match self {
            Visibility::Public => "public",
            Visibility::Install => "install",
            Visibility::Protected => "protected",
            Visibility::Private => "private",
        }
    }

    /// PUBLIC and INSTALL descriptors are the ones reported as uninstall blockers
    pub fn is_top_level(&self) -> bool {
        matches!(self, Visibility::Public | Visibility::Install)
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "install" => Ok(Visibility::Install),
            "protected" => Ok(Visibility::Protected),
            "private" => Ok(Visibility::Private),
            _ => Err(format!("Invalid visibility: {s}")),
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When an auto-feature is provisioned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallPolicy {
    /// Installed whenever it is part of a request
    #[default]
    Always,
    /// Installed once its capability requirement is met
    WhenSatisfied,
}

impl InstallPolicy {
    pub fn as_str(&self) -> &str {
        match self {
            InstallPolicy::Always => "always",
            InstallPolicy::WhenSatisfied => "when-satisfied",
        }
    }
}

impl FromStr for InstallPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "always" => Ok(InstallPolicy::Always),
            "when-satisfied" | "when_satisfied" => Ok(InstallPolicy::WhenSatisfied),
            _ => Err(format!("Invalid install policy: {s}")),
        }
    }
}

/// Kind of a constituent entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Another feature, resolved recursively
    #[default]
    Feature,
    /// Bundle, jar or file content carried inside the archive
    Other,
}

/// One required entry of a feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constituent {
    name: String,
    #[serde(default, rename = "type")]
    content_type: ContentType,
}

impl Constituent {
    pub fn feature(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: ContentType::Feature,
        }
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: ContentType::Other,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn is_feature(&self) -> bool {
        self.content_type == ContentType::Feature
    }
}

/// The product a feature is being installed into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductInfo {
    pub id: String,
    pub version: String,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub install_type: Option<String>,
}

impl ProductInfo {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            edition: None,
            install_type: None,
        }
    }

    pub fn with_edition(mut self, edition: impl Into<String>) -> Self {
        self.edition = Some(edition.into());
        self
    }

    pub fn with_install_type(mut self, install_type: impl Into<String>) -> Self {
        self.install_type = Some(install_type.into());
        self
    }
}

/// Product-applicability predicate (version, edition, install type)
///
/// Version patterns are dotted numbers. A trailing `+` means "this version or
/// later"; a comma separates alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductMatcher {
    pub product_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub editions: Vec<String>,
    #[serde(default)]
    pub install_type: Option<String>,
}

impl ProductMatcher {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            version: None,
            editions: Vec::new(),
            install_type: None,
        }
    }

    pub fn with_version(mut self, pattern: impl Into<String>) -> Self {
        self.version = Some(pattern.into());
        self
    }

    pub fn with_editions<I, S>(mut self, editions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.editions = editions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_install_type(mut self, install_type: impl Into<String>) -> Self {
        self.install_type = Some(install_type.into());
        self
    }

    /// Explain why this matcher rejects `product`, or `None` if it matches
    pub fn mismatch(&self, product: &ProductInfo) -> Option<String> {
        if self.product_id != product.id {
            return Some(format!(
                "requires product {} but found {}",
                self.product_id, product.id
            ));
        }

        if let Some(pattern) = &self.version
            && !version_matches(pattern, &product.version)
        {
            return Some(format!(
                "requires {} version {} but found {}",
                self.product_id, pattern, product.version
            ));
        }

        if !self.editions.is_empty() {
            let edition = product.edition.as_deref().unwrap_or("");
            if !self.editions.iter().any(|e| e.eq_ignore_ascii_case(edition)) {
                return Some(format!(
                    "requires edition {} but found {}",
                    self.editions.join("|"),
                    if edition.is_empty() { "<none>" } else { edition }
                ));
            }
        }

        if let Some(required) = &self.install_type {
            let actual = product.install_type.as_deref().unwrap_or("");
            if !required.eq_ignore_ascii_case(actual) {
                return Some(format!(
                    "requires install type {required} but found {}",
                    if actual.is_empty() { "<none>" } else { actual }
                ));
            }
        }

        None
    }

    pub fn matches(&self, product: &ProductInfo) -> bool {
        self.mismatch(product).is_none()
    }
}

/// Compare dotted versions segment by segment (numeric where possible)
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(l), None) => {
                if l.trim_start_matches('0').is_empty() && left.clone().all(|s| s.trim_start_matches('0').is_empty()) {
                    return Ordering::Equal;
                }
                return Ordering::Greater;
            }
            (None, Some(r)) => {
                if r.trim_start_matches('0').is_empty() && right.clone().all(|s| s.trim_start_matches('0').is_empty()) {
                    return Ordering::Equal;
                }
                return Ordering::Less;
            }
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(x), Ok(y)) => x.cmp(&y),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Match a product version against a pattern
///
/// A pattern is a comma-separated list of alternatives. Each alternative is
/// an exact version (`8.5.5.9`), a lower bound (`19.0.0.1+`), or an interval
/// with inclusive `[`/`]` or exclusive `(`/`)` ends where either bound may be
/// left empty (`[21.0,22.0)`, `(,20.0]`).
pub fn version_matches(pattern: &str, actual: &str) -> bool {
    alternatives(pattern).any(|p| alternative_matches(p, actual))
}

/// Split on commas that are not inside an interval
fn alternatives(pattern: &str) -> impl Iterator<Item = &str> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in pattern.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                terms.push(&pattern[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    terms.push(&pattern[start..]);
    terms.into_iter().map(str::trim).filter(|p| !p.is_empty())
}

fn alternative_matches(term: &str, actual: &str) -> bool {
    let open = term.chars().next();
    let close = term.chars().last();
    if let (Some(open @ ('[' | '(')), Some(close @ (']' | ')'))) = (open, close) {
        let inner = &term[1..term.len() - 1];
        let Some((low, high)) = inner.split_once(',') else {
            return false;
        };
        let (low, high) = (low.trim(), high.trim());
        let above = low.is_empty()
            || match compare_versions(actual, low) {
                Ordering::Greater => true,
                Ordering::Equal => open == '[',
                Ordering::Less => false,
            };
        let below = high.is_empty()
            || match compare_versions(actual, high) {
                Ordering::Less => true,
                Ordering::Equal => close == ']',
                Ordering::Greater => false,
            };
        return above && below;
    }

    match term.strip_suffix('+') {
        Some(base) => compare_versions(actual, base.trim()) != Ordering::Less,
        None => compare_versions(actual, term) == Ordering::Equal,
    }
}

/// One clause of an auto-feature capability requirement
///
/// The clause is satisfied when any of the listed feature names is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CapabilityClause {
    any_of: Vec<String>,
}

impl CapabilityClause {
    pub fn any_of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            any_of: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn require(name: impl Into<String>) -> Self {
        Self {
            any_of: vec![name.into()],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.any_of
    }
}

/// Metadata of one feature archive
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureDescriptor {
    symbolic_name: String,
    #[serde(default)]
    short_name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    visibility: Visibility,
    #[serde(default)]
    auto_feature: bool,
    #[serde(default)]
    install_policy: InstallPolicy,
    #[serde(default)]
    constituents: Vec<Constituent>,
    #[serde(default)]
    applies_to: Vec<ProductMatcher>,
    #[serde(default)]
    license_id: Option<String>,
    #[serde(default)]
    provision_capability: Vec<CapabilityClause>,
}

impl FeatureDescriptor {
    pub fn new(symbolic_name: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            short_name: None,
            version: None,
            visibility: Visibility::Public,
            auto_feature: false,
            install_policy: InstallPolicy::Always,
            constituents: Vec::new(),
            applies_to: Vec::new(),
            license_id: None,
            provision_capability: Vec::new(),
        }
    }

    pub fn with_short_name(mut self, short_name: impl Into<String>) -> Self {
        self.short_name = Some(short_name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as an auto-feature activated when all `clauses` are satisfied
    pub fn with_auto(mut self, policy: InstallPolicy, clauses: Vec<CapabilityClause>) -> Self {
        self.auto_feature = true;
        self.install_policy = policy;
        self.provision_capability = clauses;
        self
    }

    pub fn with_constituent(mut self, constituent: Constituent) -> Self {
        self.constituents.push(constituent);
        self
    }

    /// Convenience for adding a FEATURE-type constituent
    pub fn requires(self, name: impl Into<String>) -> Self {
        self.with_constituent(Constituent::feature(name))
    }

    pub fn with_applies_to(mut self, matcher: ProductMatcher) -> Self {
        self.applies_to.push(matcher);
        self
    }

    pub fn with_license(mut self, license_id: impl Into<String>) -> Self {
        self.license_id = Some(license_id.into());
        self
    }

    pub fn symbolic_name(&self) -> &str {
        &self.symbolic_name
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_auto_feature(&self) -> bool {
        self.auto_feature
    }

    pub fn install_policy(&self) -> InstallPolicy {
        self.install_policy
    }

    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn applies_to(&self) -> &[ProductMatcher] {
        &self.applies_to
    }

    pub fn license_id(&self) -> Option<&str> {
        self.license_id.as_deref()
    }

    pub fn provision_capability(&self) -> &[CapabilityClause] {
        &self.provision_capability
    }

    /// Names of FEATURE-type constituents, in declaration order
    pub fn required_features(&self) -> impl Iterator<Item = &str> {
        self.constituents
            .iter()
            .filter(|c| c.is_feature())
            .map(Constituent::name)
    }

    /// Symbolic names match exactly, short names case-insensitively
    pub fn matches_name(&self, name: &str) -> bool {
        self.symbolic_name == name
            || self
                .short_name
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(name))
    }

    /// Name shown to users: short name when present
    pub fn display_name(&self) -> &str {
        self.short_name.as_deref().unwrap_or(&self.symbolic_name)
    }

    /// Check product applicability; `Err` carries the reason for the first mismatch
    ///
    /// A descriptor with no matchers applies to every product. Otherwise at
    /// least one matcher has to accept at least one of the products.
    pub fn check_applicability(&self, products: &[ProductInfo]) -> std::result::Result<(), String> {
        if self.applies_to.is_empty() {
            return Ok(());
        }
        if products.is_empty() {
            return Err("no installed product to match against".to_string());
        }

        let mut first_reason = None;
        for matcher in &self.applies_to {
            for product in products {
                match matcher.mismatch(product) {
                    None => return Ok(()),
                    Some(reason) => {
                        first_reason.get_or_insert(reason);
                    }
                }
            }
        }
        Err(first_reason.unwrap_or_else(|| "no applicable product".to_string()))
    }
}

impl PartialEq for FeatureDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.symbolic_name == other.symbolic_name
    }
}

impl Eq for FeatureDescriptor {}

impl Hash for FeatureDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbolic_name.hash(state);
    }
}

impl fmt::Display for FeatureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbolic_name)
    }
}

/// A defect a fix claims to resolve (e.g. an APAR)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Problem {
    display_id: String,
    #[serde(default)]
    description: Option<String>,
}

impl Problem {
    pub fn new(display_id: impl Into<String>) -> Self {
        Self {
            display_id: display_id.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn display_id(&self) -> &str {
        &self.display_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// A file a fix replaces
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UpdatedFileRef {
    id: String,
    #[serde(default)]
    hash: Option<String>,
}

impl UpdatedFileRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            hash: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref()
    }
}

/// Metadata of one binary patch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FixDescriptor {
    id: String,
    #[serde(default)]
    problems: Vec<Problem>,
    #[serde(default)]
    updated_files: Vec<UpdatedFileRef>,
}

impl FixDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            problems: Vec::new(),
            updated_files: Vec::new(),
        }
    }

    pub fn with_problem(mut self, problem: Problem) -> Self {
        self.problems.push(problem);
        self
    }

    pub fn with_problems<I, S>(mut self, display_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.problems
            .extend(display_ids.into_iter().map(|id| Problem::new(id)));
        self
    }

    pub fn with_files<I, S>(mut self, file_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.updated_files
            .extend(file_ids.into_iter().map(|id| UpdatedFileRef::new(id)));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub fn updated_files(&self) -> &[UpdatedFileRef] {
        &self.updated_files
    }

    pub fn problem_ids(&self) -> BTreeSet<&str> {
        self.problems.iter().map(Problem::display_id).collect()
    }

    pub fn file_ids(&self) -> BTreeSet<&str> {
        self.updated_files.iter().map(UpdatedFileRef::id).collect()
    }
}

impl PartialEq for FixDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FixDescriptor {}

impl Hash for FixDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for FixDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// Anything a manifest reader can produce
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Descriptor {
    Feature(FeatureDescriptor),
    Fix(FixDescriptor),
}

impl Descriptor {
    pub fn id(&self) -> &str {
        match self {
            Descriptor::Feature(f) => f.symbolic_name(),
            Descriptor::Fix(f) => f.id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_symbolic_name() {
        let a = FeatureDescriptor::new("com.example.jdbc-4.2").with_short_name("jdbc-4.2");
        let b = FeatureDescriptor::new("com.example.jdbc-4.2").with_visibility(Visibility::Private);
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(!set.insert(b));
    }

    #[test]
    fn test_matches_name_short_name_case_insensitive() {
        let f = FeatureDescriptor::new("com.example.servlet-4.0").with_short_name("servlet-4.0");
        assert!(f.matches_name("com.example.servlet-4.0"));
        assert!(f.matches_name("Servlet-4.0"));
        assert!(!f.matches_name("COM.EXAMPLE.SERVLET-4.0"));
        assert_eq!(f.display_name(), "servlet-4.0");
    }

    #[test]
    fn test_required_features_skips_other_content() {
        let f = FeatureDescriptor::new("a")
            .requires("b")
            .with_constituent(Constituent::other("com.example.bundle"))
            .requires("c");
        let required: Vec<&str> = f.required_features().collect();
        assert_eq!(required, vec!["b", "c"]);
    }

    #[test]
    fn test_version_patterns() {
        assert!(version_matches("19.0.0.1+", "19.0.0.1"));
        assert!(version_matches("19.0.0.1+", "20.0.0.3"));
        assert!(!version_matches("19.0.0.1+", "18.0.0.4"));
        assert!(version_matches("8.5.5.9", "8.5.5.9"));
        assert!(!version_matches("8.5.5.9", "8.5.5.10"));
        assert!(version_matches("8.5.5.9, 9.0+", "9.1"));
        assert!(version_matches("9.0", "9.0.0"));
    }

    #[test]
    fn test_version_intervals() {
        assert!(version_matches("[21.0,22.0)", "21.0"));
        assert!(version_matches("[21.0,22.0)", "21.0.0.12"));
        assert!(!version_matches("[21.0,22.0)", "22.0"));
        assert!(!version_matches("(21.0,22.0]", "21.0"));
        assert!(version_matches("(21.0,22.0]", "22.0.0"));
        assert!(version_matches("(,20.0]", "8.5.5.9"));
        assert!(version_matches("[23.0,)", "24.0.0.1"));
        assert!(!version_matches("[23.0,)", "22.9"));
        // intervals mix with plain alternatives
        assert!(version_matches("8.5.5.9, [21.0,22.0)", "8.5.5.9"));
        assert!(version_matches("8.5.5.9, [21.0,22.0)", "21.5"));
        assert!(!version_matches("8.5.5.9, [21.0,22.0)", "20.0"));
        assert!(!version_matches("[21.0]", "21.0"));
    }

    #[test]
    fn test_applicability() {
        let product = ProductInfo::new("com.example.runtime", "21.0.0.3")
            .with_edition("BASE")
            .with_install_type("Archive");

        let open = FeatureDescriptor::new("a");
        assert!(open.check_applicability(&[product.clone()]).is_ok());

        let ok = FeatureDescriptor::new("b").with_applies_to(
            ProductMatcher::new("com.example.runtime")
                .with_version("21.0.0.1+")
                .with_editions(["BASE", "ND"]),
        );
        assert!(ok.check_applicability(&[product.clone()]).is_ok());

        let wrong_edition = FeatureDescriptor::new("c").with_applies_to(
            ProductMatcher::new("com.example.runtime").with_editions(["ND"]),
        );
        let reason = wrong_edition.check_applicability(&[product.clone()]).unwrap_err();
        assert!(reason.contains("edition"));

        let wrong_type = FeatureDescriptor::new("d").with_applies_to(
            ProductMatcher::new("com.example.runtime").with_install_type("InstallationManager"),
        );
        assert!(wrong_type.check_applicability(&[product]).is_err());
    }

    #[test]
    fn test_fix_sets() {
        let fix = FixDescriptor::new("21.0.0.3-IF1")
            .with_problems(["PH1", "PH2", "PH1"])
            .with_files(["lib/a.jar"]);
        assert_eq!(fix.problem_ids().len(), 2);
        assert!(fix.file_ids().contains("lib/a.jar"));
    }

    #[test]
    fn test_visibility_parse() {
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert_eq!("install".parse::<Visibility>().unwrap(), Visibility::Install);
        assert!("hidden".parse::<Visibility>().is_err());
        assert!(Visibility::Install.is_top_level());
        assert!(!Visibility::Protected.is_top_level());
    }
}
