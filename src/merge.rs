//! # Dependency Merging and Conflict Detection
//!
//! Converted requirements are collected per release into a
//! [`DependencyTable`]; once every release of the requesting package has
//! been processed, [`DependencyTable::merge_and_check`] condenses the set
//! of releases behind each unique `(dependency, condition)` pair into the
//! condition's own-version list and checks the final list for
//! unsatisfiable overlaps.
//!
//! A conflict is two same-name dependencies whose conditions can hold
//! simultaneously while no version satisfies both constraints. Conflicts
//! are diagnostics for manual review, never repaired: the merged output is
//! produced either way.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::DependencyKind;
use crate::error::ConflictError;
use crate::pip;
use crate::ranges::condense;
use crate::spec::{ConditionSpec, DependencySpec};

/// A merged dependency of the requesting package: what is required, when,
/// and for which build stages.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MergedDependency {
    /// The required package with variants and versions.
    pub dependency: DependencySpec,

    /// The condition under which the requirement applies, including the
    /// requesting-package versions that declared it.
    pub when: ConditionSpec,

    /// The declaring stages.
    pub kinds: BTreeSet<DependencyKind>,
}

impl std::fmt::Display for MergedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "depends_on(\"{}\"", self.dependency)?;
        let when = self.when.to_string();
        if !when.is_empty() {
            write!(f, ", when=\"{when}\"")?;
        }
        if !self.kinds.is_empty() {
            write!(f, ", type={}", format_kinds(&self.kinds))?;
        }
        write!(f, ")")
    }
}

/// Render a kind set the way the target package format spells dependency
/// types: `"build"` for one, `("build", "run")` for several.
fn format_kinds(kinds: &BTreeSet<DependencyKind>) -> String {
    let rendered: Vec<String> = kinds.iter().map(|kind| format!("\"{kind}\"")).collect();
    match rendered.as_slice() {
        [single] => single.clone(),
        several => format!("({})", several.join(", ")),
    }
}

#[derive(Debug, Clone, Default)]
struct Declarations {
    releases: Vec<pip::Version>,
    kinds: BTreeSet<DependencyKind>,
}

/// Accumulates converted requirements across the releases of one package.
///
/// Mutable while releases are inserted; consumed by
/// [`merge_and_check`](Self::merge_and_check), after which only the merged
/// output remains.
#[derive(Debug, Clone, Default)]
pub struct DependencyTable {
    entries: BTreeMap<(DependencySpec, ConditionSpec), Declarations>,
}

impl DependencyTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `release` of the requesting package declares the
    /// converted pairs under the given dependency kinds.
    pub fn insert(
        &mut self,
        release: &pip::Version,
        kinds: &[DependencyKind],
        pairs: impl IntoIterator<Item = (DependencySpec, ConditionSpec)>,
    ) {
        for pair in pairs {
            let declarations = self.entries.entry(pair).or_default();
            declarations.releases.push(release.clone());
            declarations.kinds.extend(kinds.iter().copied());
        }
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Condense each entry's releases against the requesting package's own
    /// known-version universe, producing the final dependency list and the
    /// conflict diagnostics.
    ///
    /// The output is ordered by dependency name, then by the normalized
    /// specs, so repeated conversions render identically.
    pub fn merge_and_check(
        self,
        own_universe: &[pip::Version],
    ) -> (Vec<MergedDependency>, Vec<ConflictError>) {
        let mut merged: Vec<MergedDependency> = self
            .entries
            .into_iter()
            .filter_map(|((dependency, mut when), declarations)| {
                let versions = condense(&declarations.releases, own_universe);
                if versions.is_empty() {
                    // Every declaring release was unrepresentable; the
                    // dependency applies to no known version.
                    return None;
                }
                if !versions.is_all() {
                    when.set_versions(versions);
                }
                Some(MergedDependency {
                    dependency,
                    when,
                    kinds: declarations.kinds,
                })
            })
            .collect();
        merged.sort();

        let conflicts = find_conflicts(&merged);
        (merged, conflicts)
    }
}

/// Flag every unordered pair of same-name dependencies whose conditions
/// intersect while their dependency specs do not.
///
/// For a correct dependency list, intersecting conditions imply
/// intersecting constraints; the converse pairs are exactly the
/// requirements no install could ever satisfy together.
fn find_conflicts(merged: &[MergedDependency]) -> Vec<ConflictError> {
    let mut by_name: BTreeMap<&str, Vec<&MergedDependency>> = BTreeMap::new();
    for dependency in merged {
        by_name
            .entry(dependency.dependency.name().as_str())
            .or_default()
            .push(dependency);
    }

    let mut conflicts = Vec::new();
    for group in by_name.values() {
        for (i, first) in group.iter().enumerate() {
            for second in &group[i + 1..] {
                if first.when.intersects(&second.when)
                    && !first.dependency.intersects(&second.dependency)
                {
                    conflicts.push(ConflictError {
                        first: first.to_string(),
                        second: second.to_string(),
                    });
                }
            }
        }
    }
    conflicts
}
