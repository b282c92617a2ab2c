//! # Version Ranges and Interval Synthesis
//!
//! A [`VersionList`] is an ordered, non-overlapping, coalesced set of
//! closed-open [`VersionRange`]s over target-scheme versions. [`condense`]
//! synthesizes the minimal such list that selects exactly a given subset of
//! a package's known versions.
//!
//! ## Boundary generalization
//!
//! Range boundaries are generalized to the shortest version prefix that
//! preserves the selection, because the target constraint language idiomatic
//! form truncates versions (`@1.1:1` rather than `@1.1.0:1.99999`). Both
//! bounds follow one rule, derived from the selection invariant:
//!
//! - The (inclusive) lower bound between an excluded `prev` and an included
//!   `curr` is the shortest release prefix of `curr` sorting strictly above
//!   `prev`, falling back to `curr` itself when no prefix does or when a
//!   prefix would discard a qualifier and sort above `curr`.
//! - The (exclusive) upper bound between an included `curr` and an excluded
//!   `nxt` is the shortest release prefix of `nxt` sorting strictly above
//!   `curr`, falling back to `nxt` itself under the same conditions.
//!
//! The zero-padded pointwise walk makes the classic corner case fall out
//! naturally: between included `2.0` and excluded `2.0.0.1` the first
//! segment where `2.0` (padded) sorts below `2.0.0.1` is the final `1`, so
//! the bound is the full `2.0.0.1` and a phantom `2.0.1` cannot leak into
//! the selection.

use serde::{Deserialize, Serialize};

use crate::pip;
use crate::version::{Prerelease, Version};

/// A closed-open interval `[lo, hi)` over target versions.
///
/// `None` bounds are infinite: `lo = None` reaches down past every version
/// and `hi = None` up past every version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionRange {
    /// Inclusive lower bound; `None` is negative infinity.
    pub lo: Option<Version>,

    /// Exclusive upper bound; `None` is positive infinity.
    pub hi: Option<Version>,
}

impl VersionRange {
    /// The range containing every version.
    pub fn any() -> Self {
        Self { lo: None, hi: None }
    }

    /// Membership test: `lo <= version < hi`.
    pub fn contains(&self, version: &Version) -> bool {
        let above_lo = match &self.lo {
            None => true,
            Some(lo) => lo <= version,
        };
        let below_hi = match &self.hi {
            None => true,
            Some(hi) => version < hi,
        };
        above_lo && below_hi
    }

    fn is_empty(&self) -> bool {
        match (&self.lo, &self.hi) {
            (Some(lo), Some(hi)) => lo >= hi,
            _ => false,
        }
    }
}

/// `lo` comparison where `None` is negative infinity.
fn max_lo(a: &Option<Version>, b: &Option<Version>) -> Option<Version> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.clone().max(b.clone())),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// `hi` comparison where `None` is positive infinity.
fn min_hi(a: &Option<Version>, b: &Option<Version>) -> Option<Version> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.clone().min(b.clone())),
        (Some(v), None) | (None, Some(v)) => Some(v.clone()),
        (None, None) => None,
    }
}

/// True when `hi_a <= hi_b`, with `None` as positive infinity.
fn hi_le(a: &Option<Version>, b: &Option<Version>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a <= b,
    }
}

/// True when a range starting at `lo` continues or touches one ending at
/// `hi` (`lo <= hi`, infinities included).
fn lo_reaches(lo: &Option<Version>, hi: &Option<Version>) -> bool {
    match (lo, hi) {
        (None, _) | (_, None) => true,
        (Some(lo), Some(hi)) => lo <= hi,
    }
}

/// An ordered, coalesced, non-overlapping set of version ranges.
///
/// Membership is the union of the member ranges. The empty list contains no
/// version at all; [`VersionList::any`] contains every version.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct VersionList(Vec<VersionRange>);

impl VersionList {
    /// The list containing every version.
    pub fn any() -> Self {
        Self(vec![VersionRange::any()])
    }

    /// Iterate over the ranges in the list.
    pub fn iter(&self) -> impl Iterator<Item = &VersionRange> {
        self.0.iter()
    }

    /// True when no version is contained.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when every version is contained.
    pub fn is_all(&self) -> bool {
        self.0.len() == 1 && self.0[0] == VersionRange::any()
    }

    /// Membership test across all ranges.
    pub fn contains(&self, version: &Version) -> bool {
        self.0.iter().any(|range| range.contains(version))
    }

    /// True when some version is contained in both lists.
    pub fn intersects(&self, other: &Self) -> bool {
        !self.intersect(other).is_empty()
    }

    /// The set intersection of two lists.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let a = &self.0[i];
            let b = &other.0[j];
            let candidate = VersionRange {
                lo: max_lo(&a.lo, &b.lo),
                hi: min_hi(&a.hi, &b.hi),
            };
            if !candidate.is_empty() {
                out.push(candidate);
            }
            if hi_le(&a.hi, &b.hi) {
                i += 1;
            } else {
                j += 1;
            }
        }
        Self(out)
    }

    /// The set union of two lists, coalescing overlapping and touching
    /// ranges.
    pub fn union(&self, other: &Self) -> Self {
        let mut ranges: Vec<VersionRange> =
            self.0.iter().chain(other.0.iter()).cloned().collect();
        ranges.sort_by(|a, b| match (&a.lo, &b.lo) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(a_lo), Some(b_lo)) => a_lo.cmp(b_lo),
        });

        let mut out: Vec<VersionRange> = Vec::new();
        for range in ranges {
            if let Some(last) = out.last_mut() {
                if lo_reaches(&range.lo, &last.hi) {
                    if !hi_le(&range.hi, &last.hi) {
                        last.hi = range.hi;
                    }
                    continue;
                }
            }
            out.push(range);
        }
        Self(out)
    }
}

impl From<Vec<VersionRange>> for VersionList {
    fn from(ranges: Vec<VersionRange>) -> Self {
        Self(ranges)
    }
}

/// Synthesize the minimal list of version ranges whose union selects
/// exactly `subset` among `universe`.
///
/// Both lists are supplied in the source scheme; versions the target scheme
/// cannot represent faithfully are excluded from the computation entirely
/// (they are neither matched nor excluded by any produced range), which
/// makes the filtering lossy by design. Entries are sorted and deduplicated
/// under the target ordering before the walk, so callers only guarantee
/// `subset ⊆ universe`.
///
/// Returns the empty list when no subset entry survives filtering.
///
/// For each maximal run of consecutive universe entries inside `subset`,
/// one range is emitted; runs touching the first or last universe entry are
/// left open towards the respective infinity, assuming the dependency
/// predates the oldest and outlives the newest known release.
pub fn condense(subset: &[pip::Version], universe: &[pip::Version]) -> VersionList {
    fn to_target(versions: &[pip::Version]) -> Vec<Version> {
        let mut converted: Vec<Version> = versions
            .iter()
            .filter(|v| v.is_supported())
            .filter_map(|v| Version::from_pip(v).ok())
            .collect();
        converted.sort();
        converted.dedup_by(|a, b| a.cmp(&b) == std::cmp::Ordering::Equal);
        converted
    }

    let subset = to_target(subset);
    let universe = to_target(universe);
    if subset.is_empty() || universe.is_empty() {
        return VersionList::default();
    }

    let mut ranges = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < universe.len() && j < subset.len() {
        if subset[j] < universe[i] {
            // Precondition violation (subset entry missing from universe);
            // skip the entry rather than looping.
            debug_assert!(false, "subset entry {} not in universe", subset[j]);
            j += 1;
            continue;
        }
        if universe[i] != subset[j] {
            i += 1;
            continue;
        }

        let start = i;
        while i < universe.len() && j < subset.len() && universe[i] == subset[j] {
            i += 1;
            j += 1;
        }

        let lo = if start == 0 {
            None
        } else {
            Some(lower_bound(&universe[start - 1], &universe[start]))
        };
        let hi = if i == universe.len() {
            None
        } else {
            Some(upper_bound(&universe[i - 1], &universe[i]))
        };
        ranges.push(VersionRange { lo, hi });
    }

    VersionList(ranges)
}

/// The most general inclusive lower bound including `curr` but not `prev`.
///
/// Requires `prev < curr`.
fn lower_bound(prev: &Version, curr: &Version) -> Version {
    shortest_clearing_prefix(prev, curr)
}

/// The most general exclusive upper bound including `curr` but not `nxt`,
/// i.e. the shortest version sorting strictly above `curr` and at or below
/// `nxt`.
///
/// Requires `curr < nxt`.
fn upper_bound(curr: &Version, nxt: &Version) -> Version {
    shortest_clearing_prefix(curr, nxt)
}

/// The shortest release prefix of `upper` sorting strictly above `lower`,
/// or `upper` itself when no prefix does (equal releases up to padding) or
/// when the prefix would discard a qualifier and overshoot `upper`.
fn shortest_clearing_prefix(lower: &Version, upper: &Version) -> Version {
    for (i, &segment) in upper.release.iter().enumerate() {
        let lower_segment = lower.release.get(i).copied().unwrap_or(0);
        match lower_segment.cmp(&segment) {
            std::cmp::Ordering::Less => {
                let candidate = upper.prefix(i + 1);
                return if candidate > *upper {
                    // The prefix would drop a pre-release or dev qualifier
                    // and sort above `upper`, widening the bound too far.
                    upper.clone()
                } else {
                    candidate
                };
            }
            std::cmp::Ordering::Equal => continue,
            std::cmp::Ordering::Greater => break,
        }
    }
    upper.clone()
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.lo, &self.hi) {
            (None, None) => write!(f, ":"),
            (Some(lo), None) => write!(f, "{lo}:"),
            (lo, Some(hi)) => {
                let hi = inclusive_upper(hi);
                match lo {
                    Some(lo) if *lo == hi => write!(f, "{lo}"),
                    Some(lo) => write!(f, "{lo}:{hi}"),
                    None => write!(f, ":{hi}"),
                }
            }
        }
    }
}

/// Convert an exclusive upper bound into the inclusive, prefix-style bound
/// the target syntax uses.
///
/// Exact for the fully supported version shapes (plain releases and
/// pre-releases with a positive sequence number); best-effort for bounds
/// carrying post/dev/local qualifiers, which only arise from
/// semi-supported universe entries.
fn inclusive_upper(hi: &Version) -> Version {
    let mut v = hi.clone();
    v.local.clear();
    if let Some(pre) = v.pre {
        if pre.number() > 0 {
            v.pre = Some(match pre {
                Prerelease::Alpha(n) => Prerelease::Alpha(n - 1),
                Prerelease::Beta(n) => Prerelease::Beta(n - 1),
                Prerelease::Rc(n) => Prerelease::Rc(n - 1),
            });
            return v;
        }
        v.pre = None;
    }
    if let Some(dev) = v.dev.take() {
        if dev > 0 {
            v.dev = Some(dev - 1);
            return v;
        }
    }
    if let Some(post) = v.post.take() {
        if post > 0 {
            v.post = Some(post - 1);
            return v;
        }
    }
    // Plain release: drop trailing zeros, then step the last segment down,
    // producing the widest prefix still below the exclusive bound.
    while v.release.last() == Some(&0) {
        v.release.pop();
    }
    match v.release.last_mut() {
        Some(last) if *last > 0 => *last -= 1,
        _ => v.release = vec![0],
    }
    v
}

impl std::fmt::Display for VersionList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for range in &self.0 {
            if first {
                first = false;
                write!(f, "{range}")?;
            } else {
                write!(f, ",{range}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use simple_test_case::test_case;

    use super::*;
    use crate::version::Prerelease;

    fn pv(s: &str) -> pip::Version {
        s.parse().expect("must parse pip version")
    }

    fn tv(s: &str) -> Version {
        s.parse().expect("must parse target version")
    }

    fn pvs(list: &[&str]) -> Vec<pip::Version> {
        list.iter().map(|s| pv(s)).collect()
    }

    /// The versions of `universe` selected by condensing `subset`.
    fn selected(subset: &[&str], universe: &[&str]) -> Vec<String> {
        let condensed = condense(&pvs(subset), &pvs(universe));
        universe
            .iter()
            .filter(|s| {
                let target =
                    Version::from_pip(&pv(s)).expect("universe versions must convert");
                condensed.contains(&target)
            })
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn selects_exactly_the_subset() {
        let universe = ["1.0", "1.1", "1.2", "2.0"];
        assert_eq!(selected(&["1.1", "1.2"], &universe), vec!["1.1", "1.2"]);
        assert_eq!(selected(&["1.0"], &universe), vec!["1.0"]);
        assert_eq!(selected(&["2.0"], &universe), vec!["2.0"]);
        assert_eq!(
            selected(&["1.0", "2.0"], &universe),
            vec!["1.0", "2.0"]
        );
    }

    #[test]
    fn interior_run_generalizes_bounds() {
        let condensed = condense(
            &pvs(&["1.1", "1.2"]),
            &pvs(&["1.0", "1.1", "1.2", "2.0"]),
        );
        let expected = VersionList::from(vec![VersionRange {
            lo: Some(tv("1.1")),
            hi: Some(tv("2")),
        }]);
        assert_eq!(condensed, expected);
        assert_eq!(condensed.to_string(), "1.1:1");
    }

    #[test]
    fn equivalent_specifier_condenses_to_identical_range() {
        let universe = pvs(&["1.0", "1.1", "1.2", "2.0"]);
        let specifier: crate::specifier::SpecifierSet =
            ">=1.1,<2.0".parse().expect("must parse");
        let matching: Vec<pip::Version> = universe
            .iter()
            .filter(|v| specifier.all_match(v))
            .cloned()
            .collect();
        assert_eq!(
            condense(&matching, &universe),
            condense(&pvs(&["1.1", "1.2"]), &universe),
        );
    }

    #[test]
    fn full_subset_is_unbounded() {
        let universe = ["1.0", "1.1", "2.0"];
        let condensed = condense(&pvs(&universe), &pvs(&universe));
        assert!(condensed.is_all());
        assert_eq!(condensed.to_string(), ":");
    }

    #[test]
    fn empty_subset_is_empty() {
        assert!(condense(&[], &pvs(&["1.0"])).is_empty());
    }

    #[test]
    fn prefix_boundary_does_not_leak_subversions() {
        // The bound between 2.0 and 2.0.0.1 must not let a phantom 2.0.1 in.
        let condensed = condense(
            &pvs(&["2.0", "2.1"]),
            &pvs(&["2.0", "2.0.0.1", "2.1"]),
        );
        assert!(condensed.contains(&tv("2.0")));
        assert!(condensed.contains(&tv("2.1")));
        assert!(!condensed.contains(&tv("2.0.0.1")));
        assert!(!condensed.contains(&tv("2.0.1")));
    }

    #[test]
    fn prerelease_lower_bound_is_not_widened() {
        // Generalizing 4.3-alpha1 to 4.3 would exclude the prerelease.
        let condensed = condense(
            &pvs(&["4.3a1", "4.4"]),
            &pvs(&["4.2", "4.3a1", "4.4"]),
        );
        assert!(condensed.contains(&tv("4.3-alpha1")));
        assert!(!condensed.contains(&tv("4.2")));
        assert_eq!(
            condensed.iter().next().expect("one range").lo,
            Some(Version {
                release: vec![4, 3],
                pre: Some(Prerelease::Alpha(1)),
                ..Version::default()
            })
        );
    }

    #[test]
    fn prerelease_upper_bound_is_not_widened() {
        // The bound between 4.2 and 4.3-alpha1 must exclude the prerelease.
        let condensed = condense(
            &pvs(&["4.1", "4.2"]),
            &pvs(&["4.1", "4.2", "4.3a1", "4.3"]),
        );
        assert!(condensed.contains(&tv("4.2")));
        assert!(!condensed.contains(&tv("4.3-alpha1")));
        assert!(!condensed.contains(&tv("4.3")));
    }

    #[test]
    fn unsupported_versions_are_invisible() {
        // 1.1a1.post2 cannot be represented; it is neither matched nor
        // excluded, and the surrounding versions condense as if it did not
        // exist.
        let with = condense(
            &pvs(&["1.0", "1.1"]),
            &pvs(&["1.0", "1.1a1.post2", "1.1"]),
        );
        let without = condense(&pvs(&["1.0", "1.1"]), &pvs(&["1.0", "1.1"]));
        assert_eq!(with, without);
    }

    #[test]
    fn deterministic() {
        let subset = pvs(&["1.1", "1.3", "2.0"]);
        let universe = pvs(&["1.0", "1.1", "1.2", "1.3", "1.4", "2.0"]);
        let first = condense(&subset, &universe);
        let second = condense(&subset, &universe);
        assert_eq!(first, second);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test_case(&["1.1"], "1.1"; "gap_selects_single")]
    #[test_case(&["1.1", "1.3"], "1.1,1.3:"; "split_runs")]
    #[test]
    fn rendered_ranges(subset: &[&str], expected: &str) {
        let universe = pvs(&["1.0", "1.1", "1.2", "1.3"]);
        let condensed = condense(&pvs(subset), &universe);
        assert_eq!(condensed.to_string(), expected);
    }

    #[test]
    fn list_set_operations() {
        let a = VersionList::from(vec![VersionRange {
            lo: Some(tv("1.0")),
            hi: Some(tv("2.0")),
        }]);
        let b = VersionList::from(vec![VersionRange {
            lo: Some(tv("1.5")),
            hi: Some(tv("3.0")),
        }]);
        let c = VersionList::from(vec![VersionRange {
            lo: Some(tv("4.0")),
            hi: None,
        }]);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(
            a.intersect(&b),
            VersionList::from(vec![VersionRange {
                lo: Some(tv("1.5")),
                hi: Some(tv("2.0")),
            }])
        );
        assert_eq!(
            a.union(&b),
            VersionList::from(vec![VersionRange {
                lo: Some(tv("1.0")),
                hi: Some(tv("3.0")),
            }])
        );
        // Touching ranges coalesce.
        let d = VersionList::from(vec![VersionRange {
            lo: Some(tv("2.0")),
            hi: Some(tv("3.0")),
        }]);
        assert_eq!(
            a.union(&d),
            VersionList::from(vec![VersionRange {
                lo: Some(tv("1.0")),
                hi: Some(tv("3.0")),
            }])
        );
        assert!(VersionList::any().intersects(&a));
        assert!(!VersionList::default().intersects(&a));
    }

    fn arb_version() -> impl Strategy<Value = pip::Version> {
        (
            prop::collection::vec(0u64..4, 1..4),
            prop::option::of((0u8..3, 0u64..3)),
        )
            .prop_map(|(release, pre)| {
                let pre = pre.map(|(kind, n)| match kind {
                    0 => Prerelease::Alpha(n),
                    1 => Prerelease::Beta(n),
                    _ => Prerelease::Rc(n),
                });
                let builder = pip::Version::builder().release(release);
                match pre {
                    Some(pre) => builder.pre(pre).build(),
                    None => builder.build(),
                }
            })
    }

    proptest! {
        /// Condensation soundness: the produced ranges select exactly the
        /// subset among the universe, for arbitrary inputs.
        #[test]
        fn condense_selects_exactly_the_subset(
            versions in prop::collection::vec(arb_version(), 1..12),
            mask in any::<u32>(),
        ) {
            let mut universe = versions;
            universe.sort();
            universe.dedup_by(|a, b| a.cmp(&b).is_eq());

            let subset: Vec<pip::Version> = universe
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << (i % 32)) != 0)
                .map(|(_, v)| v.clone())
                .collect();

            let condensed = condense(&subset, &universe);
            for v in &universe {
                let target = Version::from_pip(v).expect("generated versions convert");
                let selected = condensed.contains(&target);
                let expected = subset.iter().any(|s| s.cmp(v).is_eq());
                prop_assert_eq!(
                    selected,
                    expected,
                    "version {} in condensation of {:?}",
                    v,
                    subset.iter().map(ToString::to_string).collect::<Vec<_>>()
                );
            }
        }
    }
}
