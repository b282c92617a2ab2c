//! # Target Constraint Objects
//!
//! The output vocabulary of the conversion: a [`DependencySpec`] names the
//! required package together with requested variants and an eventual
//! version list, and a [`ConditionSpec`] expresses the conjunction of
//! circumstances under which the requirement applies (requesting-package
//! versions, platform, variant flags, versions of another dependency).
//!
//! A [`Disjunction`] is an explicit list-of-alternatives over conditions;
//! the marker evaluator produces and combines these.
//!
//! ## Equality
//!
//! Two specs are equal iff their normalized forms are equal. The types keep
//! themselves normalized (sorted-map backed fields), so the derived
//! equality coincides with equality of the rendered text, and the derived
//! ordering gives deterministic output.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Unsatisfiable;
use crate::ranges::VersionList;
use crate::{PackageName, Platform};

/// The dependency half of a converted requirement: package, requested
/// variants, acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DependencySpec {
    name: PackageName,
    variants: BTreeSet<String>,
    versions: VersionList,
}

impl DependencySpec {
    /// A dependency on any version of `name`, with no variants.
    pub fn new(name: PackageName) -> Self {
        Self {
            name,
            variants: BTreeSet::new(),
            versions: VersionList::any(),
        }
    }

    /// The package name.
    pub fn name(&self) -> &PackageName {
        &self.name
    }

    /// The acceptable versions.
    pub fn versions(&self) -> &VersionList {
        &self.versions
    }

    /// Restrict the dependency to `versions`.
    pub fn set_versions(&mut self, versions: VersionList) {
        self.versions = versions;
    }

    /// Request a variant (optional feature) of the dependency.
    pub fn add_variant(&mut self, name: impl Into<String>) {
        self.variants.insert(name.into());
    }

    /// True when some version could satisfy both specs.
    ///
    /// Variants are requested positively on both sides and cannot conflict;
    /// only the version lists decide.
    pub fn intersects(&self, other: &Self) -> bool {
        self.name == other.name && self.versions.intersects(&other.versions)
    }
}

impl std::fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.versions.is_all() {
            write!(f, "@{}", self.versions)?;
        }
        for variant in &self.variants {
            write!(f, "+{variant}")?;
        }
        Ok(())
    }
}

/// The condition half of a converted requirement: the conjunction of
/// circumstances under which the dependency applies.
///
/// An unconstrained condition (the default) always applies.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// Versions of the requesting package the condition covers.
    versions: VersionList,

    /// Platform the condition is limited to.
    platform: Option<Platform>,

    /// Variant flags: `true` requires the flag, `false` forbids it.
    variants: BTreeMap<String, bool>,

    /// Version constraints on other dependencies (the python pseudo-package
    /// in practice).
    dependencies: BTreeMap<PackageName, VersionList>,
}

impl Default for ConditionSpec {
    fn default() -> Self {
        Self {
            versions: VersionList::any(),
            platform: None,
            variants: BTreeMap::new(),
            dependencies: BTreeMap::new(),
        }
    }
}

impl ConditionSpec {
    /// The condition that always applies.
    pub fn new() -> Self {
        Self::default()
    }

    /// A condition limited to one platform.
    pub fn on_platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Self::default()
        }
    }

    /// A condition on a variant flag of the requesting package.
    pub fn with_variant(name: impl Into<String>, enabled: bool) -> Self {
        let mut variants = BTreeMap::new();
        variants.insert(name.into(), enabled);
        Self {
            variants,
            ..Self::default()
        }
    }

    /// A condition on the versions of another dependency.
    pub fn with_dependency(name: PackageName, versions: VersionList) -> Self {
        let mut dependencies = BTreeMap::new();
        dependencies.insert(name, versions);
        Self {
            dependencies,
            ..Self::default()
        }
    }

    /// The requesting-package versions the condition covers.
    pub fn versions(&self) -> &VersionList {
        &self.versions
    }

    /// Limit the condition to `versions` of the requesting package.
    pub fn set_versions(&mut self, versions: VersionList) {
        self.versions = versions;
    }

    /// True when the condition imposes nothing and always applies.
    pub fn is_trivial(&self) -> bool {
        self.versions.is_all()
            && self.platform.is_none()
            && self.variants.is_empty()
            && self.dependencies.is_empty()
    }

    /// True when the condition constrains dependency versions only (no
    /// platform, no variants, no own-version restriction).
    pub fn is_pure_version_condition(&self) -> bool {
        self.platform.is_none() && self.variants.is_empty() && self.versions.is_all()
    }

    /// The dependency names the condition constrains.
    fn dependency_names(&self) -> BTreeSet<&PackageName> {
        self.dependencies.keys().collect()
    }

    /// Widen the version constraint on dependency `name` by `versions`.
    ///
    /// A constraint widened to all versions is dropped entirely.
    fn widen_dependency(&mut self, name: &PackageName, versions: &VersionList) {
        if let Some(existing) = self.dependencies.get_mut(name) {
            let widened = existing.union(versions);
            if widened.is_all() {
                self.dependencies.remove(name);
            } else {
                *existing = widened;
            }
        }
    }

    /// Conjoin `other` onto this condition.
    ///
    /// Fails with [`Unsatisfiable`] when the two contradict: different
    /// platforms, a variant required and forbidden, or version constraints
    /// with an empty intersection.
    pub fn constrain(&mut self, other: &Self) -> Result<(), Unsatisfiable> {
        match (self.platform, other.platform) {
            (Some(mine), Some(theirs)) if mine != theirs => return Err(Unsatisfiable),
            (None, Some(theirs)) => self.platform = Some(theirs),
            _ => {}
        }

        for (name, &enabled) in &other.variants {
            match self.variants.get(name) {
                Some(&existing) if existing != enabled => return Err(Unsatisfiable),
                _ => {
                    self.variants.insert(name.clone(), enabled);
                }
            }
        }

        let versions = self.versions.intersect(&other.versions);
        if versions.is_empty() {
            return Err(Unsatisfiable);
        }
        self.versions = versions;

        for (name, theirs) in &other.dependencies {
            match self.dependencies.get_mut(name) {
                Some(mine) => {
                    let intersection = mine.intersect(theirs);
                    if intersection.is_empty() {
                        return Err(Unsatisfiable);
                    }
                    *mine = intersection;
                }
                None => {
                    self.dependencies.insert(name.clone(), theirs.clone());
                }
            }
        }

        Ok(())
    }

    /// True when both conditions can hold at the same time.
    pub fn intersects(&self, other: &Self) -> bool {
        self.clone().constrain(other).is_ok()
    }
}

impl std::fmt::Display for ConditionSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut rendered = String::new();
        if !self.versions.is_all() {
            rendered.push_str(&format!("@{}", self.versions));
        }
        for (name, enabled) in &self.variants {
            let sigil = if *enabled { '+' } else { '~' };
            rendered.push(sigil);
            rendered.push_str(name);
        }
        if let Some(platform) = self.platform {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            rendered.push_str(&format!("platform={platform}"));
        }
        for (name, versions) in &self.dependencies {
            if !rendered.is_empty() {
                rendered.push(' ');
            }
            if versions.is_all() {
                rendered.push_str(&format!("^{name}"));
            } else {
                rendered.push_str(&format!("^{name}@{versions}"));
            }
        }
        write!(f, "{rendered}")
    }
}

/// An explicit list of alternative conditions: the requirement applies when
/// any of them holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Disjunction(Vec<ConditionSpec>);

impl From<Vec<ConditionSpec>> for Disjunction {
    fn from(alternatives: Vec<ConditionSpec>) -> Self {
        Self::normalized(alternatives)
    }
}

impl Disjunction {
    /// The disjunction of exactly one condition.
    pub fn single(condition: ConditionSpec) -> Self {
        Self(vec![condition])
    }

    /// The always-true disjunction: one unconstrained condition.
    pub fn trivial() -> Self {
        Self::single(ConditionSpec::new())
    }

    /// The alternatives, normalized and deduplicated.
    pub fn alternatives(&self) -> &[ConditionSpec] {
        &self.0
    }

    /// Consume into the alternatives.
    pub fn into_alternatives(self) -> Vec<ConditionSpec> {
        self.0
    }

    /// True when no alternative remains (the requirement never applies).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn normalized(mut alternatives: Vec<ConditionSpec>) -> Self {
        alternatives.sort();
        alternatives.dedup();
        Self(alternatives)
    }

    /// Conjoin two disjunctions: `(a or b) and (c or d)` expands to the
    /// pairwise conjunctions, dropping contradictory pairings. An empty
    /// result means the combination can never hold.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        for left in &self.0 {
            for right in &other.0 {
                let mut merged = left.clone();
                if merged.constrain(right).is_ok() {
                    out.push(merged);
                }
            }
        }
        Self::normalized(out)
    }

    /// Union two disjunctions: `(a or b) or (c or d)` is the combined list,
    /// with one simplification to keep output compact: when the right-hand
    /// side is a single pure version condition and every left-hand
    /// alternative constrains the same dependency, the right-hand versions
    /// widen each alternative instead of appending a new one.
    pub fn union(&self, other: &Self) -> Self {
        if let [single] = other.0.as_slice() {
            if single.is_pure_version_condition()
                && single.dependencies.len() == 1
                && !self.0.is_empty()
                && self
                    .0
                    .iter()
                    .all(|alt| alt.dependency_names() == single.dependency_names())
            {
                let mut widened = self.0.clone();
                for alternative in &mut widened {
                    for (name, versions) in &single.dependencies {
                        alternative.widen_dependency(name, versions);
                    }
                }
                return Self::normalized(widened);
            }
        }

        Self::normalized(self.0.iter().chain(other.0.iter()).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    use super::*;
    use crate::pip;
    use crate::ranges::condense;

    fn name(s: &str) -> PackageName {
        PackageName::from_pypi(s)
    }

    fn pvs(list: &[&str]) -> Vec<pip::Version> {
        list.iter().map(|s| s.parse().expect("must parse")).collect()
    }

    /// A version list selecting `subset` out of `universe`.
    fn versions(subset: &[&str], universe: &[&str]) -> VersionList {
        condense(&pvs(subset), &pvs(universe))
    }

    #[test]
    fn dependency_spec_renders_canonically() {
        let mut dep = DependencySpec::new(name("typing-extensions"));
        assert_eq!(dep.to_string(), "py-typing-extensions");

        dep.set_versions(versions(
            &["4.1", "4.2"],
            &["4.0", "4.1", "4.2", "5.0"],
        ));
        dep.add_variant("docs");
        assert_eq!(dep.to_string(), "py-typing-extensions@4.1:4+docs");
    }

    #[test]
    fn condition_spec_renders_canonically() {
        let mut cond = ConditionSpec::on_platform(Platform::Linux);
        cond.constrain(&ConditionSpec::with_variant("cuda", true))
            .expect("must constrain");
        cond.constrain(&ConditionSpec::with_variant("rocm", false))
            .expect("must constrain");
        cond.constrain(&ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.9", "3.10"], &["3.8", "3.9", "3.10", "3.11"]),
        ))
        .expect("must constrain");
        assert_eq!(cond.to_string(), "+cuda~rocm platform=linux ^python@3.9:3.10");
    }

    #[test]
    fn trivial_condition_renders_empty() {
        assert_eq!(ConditionSpec::new().to_string(), "");
        assert!(ConditionSpec::new().is_trivial());
    }

    #[test_case(
        ConditionSpec::on_platform(Platform::Linux),
        ConditionSpec::on_platform(Platform::Windows);
        "different_platforms"
    )]
    #[test_case(
        ConditionSpec::with_variant("x", true),
        ConditionSpec::with_variant("x", false);
        "opposite_variants"
    )]
    #[test]
    fn contradictions_fail_to_constrain(a: ConditionSpec, b: ConditionSpec) {
        a.clone().constrain(&b).expect_err("must contradict");
        assert!(!a.intersects(&b));
    }

    #[test]
    fn compatible_conditions_merge() {
        let mut cond = ConditionSpec::on_platform(Platform::Linux);
        cond.constrain(&ConditionSpec::on_platform(Platform::Linux))
            .expect("same platform is compatible");
        cond.constrain(&ConditionSpec::with_variant("x", true))
            .expect("fresh variant is compatible");
        assert!(cond.intersects(&ConditionSpec::new()));
    }

    #[test]
    fn disjoint_dependency_versions_contradict() {
        let universe = ["3.8", "3.9", "3.10", "3.11"];
        let old = ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.8"], &universe),
        );
        let new = ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.10", "3.11"], &universe),
        );
        assert!(!old.intersects(&new));
    }

    #[test]
    fn dependency_specs_intersect_by_version() {
        let universe = ["1.0", "2.0", "3.0", "4.0"];
        let mut low = DependencySpec::new(name("pkg"));
        low.set_versions(versions(&["1.0", "2.0"], &universe));
        let mut high = DependencySpec::new(name("pkg"));
        high.set_versions(versions(&["3.0", "4.0"], &universe));
        let mut mid = DependencySpec::new(name("pkg"));
        mid.set_versions(versions(&["2.0", "3.0"], &universe));

        assert!(!low.intersects(&high));
        assert!(low.intersects(&mid));
        assert!(high.intersects(&mid));
        assert!(!low.intersects(&DependencySpec::new(name("other"))));
    }

    #[test]
    fn intersect_distributes_and_drops_contradictions() {
        let linux = Disjunction::single(ConditionSpec::on_platform(Platform::Linux));
        let windows_or_linux = Disjunction::normalized(vec![
            ConditionSpec::on_platform(Platform::Windows),
            ConditionSpec::on_platform(Platform::Linux),
        ]);
        let combined = linux.intersect(&windows_or_linux);
        assert_eq!(
            combined.alternatives(),
            &[ConditionSpec::on_platform(Platform::Linux)]
        );

        let windows = Disjunction::single(ConditionSpec::on_platform(Platform::Windows));
        assert!(linux.intersect(&windows).is_empty());
    }

    #[test]
    fn union_appends_and_dedups() {
        let linux = Disjunction::single(ConditionSpec::on_platform(Platform::Linux));
        let windows = Disjunction::single(ConditionSpec::on_platform(Platform::Windows));
        let both = linux.union(&windows);
        assert_eq!(both.alternatives().len(), 2);
        assert_eq!(both.union(&linux).alternatives().len(), 2);
    }

    #[test]
    fn union_widens_pure_version_alternatives() {
        let universe = ["3.8", "3.9", "3.10", "3.11"];
        let old = Disjunction::single(ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.8"], &universe),
        ));
        let new = Disjunction::single(ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.10", "3.11"], &universe),
        ));
        let merged = old.union(&new);
        assert_eq!(merged.alternatives().len(), 1, "widened, not appended");

        let condition = &merged.alternatives()[0];
        let contains = |v: &str| {
            condition.dependencies[&name("python")]
                .contains(&v.parse().expect("must parse"))
        };
        assert!(contains("3.8"));
        assert!(!contains("3.9"));
        assert!(contains("3.10"));
        assert!(contains("3.11"));
    }

    #[test]
    fn union_does_not_widen_mixed_alternatives() {
        let universe = ["3.8", "3.9"];
        let platform = Disjunction::single(ConditionSpec::on_platform(Platform::Windows));
        let python = Disjunction::single(ConditionSpec::with_dependency(
            name("python"),
            versions(&["3.9"], &universe),
        ));
        // The platform alternative does not constrain python; collapsing
        // would lose it. Both alternatives must survive.
        assert_eq!(platform.union(&python).alternatives().len(), 2);
    }

    #[test]
    fn equality_matches_rendered_form() {
        let mut a = ConditionSpec::on_platform(Platform::Linux);
        a.constrain(&ConditionSpec::with_variant("x", true))
            .expect("must constrain");
        let mut b = ConditionSpec::with_variant("x", true);
        b.constrain(&ConditionSpec::on_platform(Platform::Linux))
            .expect("must constrain");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }
}
