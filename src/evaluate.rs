//! # Marker Evaluation
//!
//! Translates a marker expression into target constraints: statically true,
//! statically false, a disjunction of [`ConditionSpec`] alternatives, or
//! indeterminate when the expression has no target-language equivalent.
//!
//! ## Leaf rules
//!
//! - Interpreter identity (`implementation_name`,
//!   `platform_python_implementation`) decides statically — only `cpython`
//!   is supported.
//! - Platform comparisons map onto the enumerated [`Platform`] set; `!=`
//!   expands into the disjunction of the remaining platforms, and literals
//!   naming no supported platform decide statically ("cannot happen here").
//! - Python-version comparisons condense against the static python release
//!   table and become a version condition on the `python` pseudo-dependency.
//!   The portion below the oldest supported line is implied and stripped.
//! - `extra` comparisons become variant conditions.
//! - A leaf with the literal on the left is normalized by flipping the
//!   operator; anything else is indeterminate.
//!
//! ## Combination
//!
//! Within an "and" group: false absorbs, indeterminate dominates anything
//! but false, true is the identity, and condition lists combine by pairwise
//! conjunction (an empty result is false). Across "or" groups: true
//! short-circuits, indeterminate dominates anything but true, and condition
//! lists combine by union.

use lazy_regex::regex_is_match;
use tracing::warn;

use crate::marker::{MarkerExpr, MarkerLeaf, MarkerOp, MarkerOperand, MarkerVar};
use crate::provider::VersionOracle;
use crate::ranges::{VersionList, VersionRange};
use crate::spec::{ConditionSpec, Disjunction};
use crate::specifier::SpecifierSet;
use crate::version::Version;
use crate::{PackageName, Platform};
use strum::IntoEnumIterator;

/// Python release lines at or below this bound are unconditionally
/// unsupported; constraints implied by the bound are redundant.
const OLDEST_SUPPORTED_PYTHON: [u64; 2] = [3, 6];

/// The outcome of evaluating a marker expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Evaluation {
    /// The marker holds in every supported environment.
    Always,

    /// The marker holds in no supported environment; the requirement is
    /// dropped (not an error).
    Never,

    /// The marker holds under any of these alternative conditions.
    When(Disjunction),

    /// The marker cannot be translated; the caller reports the requirement
    /// as unconvertible.
    Indeterminate,
}

/// Evaluate a marker expression against the known-version universes
/// supplied by `oracle`.
#[tracing::instrument(skip(oracle))]
pub fn evaluate_marker(expr: &MarkerExpr, oracle: &VersionOracle<'_>) -> Evaluation {
    let groups = expr.groups();
    let Some(first) = groups.first() else {
        return Evaluation::Always;
    };

    let mut lhs = evaluate_group(first, oracle);
    for group in &groups[1..] {
        if matches!(lhs, Evaluation::Always) {
            return Evaluation::Always;
        }
        let rhs = evaluate_group(group, oracle);
        lhs = match (lhs, rhs) {
            (_, Evaluation::Always) => return Evaluation::Always,
            (Evaluation::Indeterminate, _) | (_, Evaluation::Indeterminate) => {
                Evaluation::Indeterminate
            }
            (Evaluation::Never, rhs) => rhs,
            (lhs, Evaluation::Never) => lhs,
            (Evaluation::When(left), Evaluation::When(right)) => {
                Evaluation::When(left.union(&right))
            }
            (Evaluation::Always, _) => Evaluation::Always,
        };
    }

    finalize(lhs)
}

/// A disjunction containing an unconstrained alternative is simply true.
fn finalize(outcome: Evaluation) -> Evaluation {
    match outcome {
        Evaluation::When(conditions) => {
            if conditions.is_empty() {
                Evaluation::Never
            } else if conditions.alternatives().iter().any(ConditionSpec::is_trivial) {
                Evaluation::Always
            } else {
                Evaluation::When(conditions)
            }
        }
        other => other,
    }
}

/// Evaluate one "and" group left to right.
fn evaluate_group(group: &[MarkerLeaf], oracle: &VersionOracle<'_>) -> Evaluation {
    let Some(first) = group.first() else {
        return Evaluation::Always;
    };

    let mut lhs = evaluate_leaf(first, oracle);
    for leaf in &group[1..] {
        if matches!(lhs, Evaluation::Never) {
            return Evaluation::Never;
        }
        let rhs = evaluate_leaf(leaf, oracle);
        lhs = match (lhs, rhs) {
            (_, Evaluation::Never) => return Evaluation::Never,
            (Evaluation::Indeterminate, _) | (_, Evaluation::Indeterminate) => {
                Evaluation::Indeterminate
            }
            (lhs, Evaluation::Always) => lhs,
            (Evaluation::Always, rhs) => rhs,
            (Evaluation::When(left), Evaluation::When(right)) => {
                let conditions = left.intersect(&right);
                if conditions.is_empty() {
                    return Evaluation::Never;
                }
                Evaluation::When(conditions)
            }
            (Evaluation::Never, _) => return Evaluation::Never,
        };
    }
    lhs
}

/// Evaluate a single comparison leaf.
fn evaluate_leaf(leaf: &MarkerLeaf, oracle: &VersionOracle<'_>) -> Evaluation {
    // Normalize a literal on the left by flipping the comparison.
    let (var, op, value) = match (&leaf.lhs, &leaf.rhs) {
        (MarkerOperand::Variable(var), MarkerOperand::Literal(value)) => {
            (var, leaf.op, value.as_str())
        }
        (MarkerOperand::Literal(value), MarkerOperand::Variable(var)) => {
            match leaf.op.flipped() {
                Some(op) => (var, op, value.as_str()),
                None => {
                    warn!("do not know how to evaluate `{leaf}`");
                    return Evaluation::Indeterminate;
                }
            }
        }
        _ => {
            warn!("do not know how to evaluate `{leaf}`");
            return Evaluation::Indeterminate;
        }
    };

    match var {
        MarkerVar::ImplementationName | MarkerVar::PlatformPythonImplementation => {
            // All the target ecosystem packages is cpython.
            let is_cpython = value.eq_ignore_ascii_case("cpython");
            match op {
                MarkerOp::Equal => decided(is_cpython),
                MarkerOp::NotEqual => decided(!is_cpython),
                _ => Evaluation::Indeterminate,
            }
        }
        MarkerVar::PlatformSystem | MarkerVar::SysPlatform => evaluate_platform(op, value),
        MarkerVar::PythonVersion | MarkerVar::PythonFullVersion => {
            evaluate_python(op, value, oracle)
        }
        MarkerVar::Extra => evaluate_extra(op, value),
        MarkerVar::Other(name) => {
            warn!("unrecognized marker variable `{name}`");
            Evaluation::Indeterminate
        }
    }
}

fn decided(value: bool) -> Evaluation {
    if value {
        Evaluation::Always
    } else {
        Evaluation::Never
    }
}

fn evaluate_platform(op: MarkerOp, value: &str) -> Evaluation {
    if !matches!(op, MarkerOp::Equal | MarkerOp::NotEqual) {
        return Evaluation::Indeterminate;
    }

    match Platform::from_marker_value(value) {
        Some(platform) => {
            // Equality selects the platform; inequality selects the
            // disjunction of all the others.
            let keep = |p: &Platform| match op {
                MarkerOp::Equal => *p == platform,
                _ => *p != platform,
            };
            let alternatives: Vec<ConditionSpec> = Platform::iter()
                .filter(keep)
                .map(ConditionSpec::on_platform)
                .collect();
            Evaluation::When(Disjunction::from(alternatives))
        }
        // A platform this crate does not enumerate cannot be the build
        // host, so the comparison decides statically.
        None => decided(op == MarkerOp::NotEqual),
    }
}

fn evaluate_python(op: MarkerOp, value: &str, oracle: &VersionOracle<'_>) -> Evaluation {
    let operator = match op {
        MarkerOp::Equal => "==",
        MarkerOp::NotEqual => "!=",
        MarkerOp::Less => "<",
        MarkerOp::LessOrEqual => "<=",
        MarkerOp::Greater => ">",
        MarkerOp::GreaterOrEqual => ">=",
        // `in` / `not in` compare rendered strings, `~=` is not used in
        // practice; none translate.
        _ => return Evaluation::Indeterminate,
    };

    let specifier: SpecifierSet = match format!("{operator}{value}").parse() {
        Ok(specifier) => specifier,
        Err(_) => {
            warn!("could not parse `{operator}{value}` as a specifier");
            return Evaluation::Indeterminate;
        }
    };

    let Ok(versions) = oracle.matching("python", &specifier) else {
        return Evaluation::Indeterminate;
    };
    let versions = strip_unsupported_floor(&versions);

    if versions.is_empty() {
        return Evaluation::Never;
    }
    if versions.is_all() {
        return Evaluation::Always;
    }
    Evaluation::When(Disjunction::single(ConditionSpec::with_dependency(
        PackageName::from_pypi("python"),
        versions,
    )))
}

/// Remove the portion of a python version list implied by the oldest
/// supported line: ranges entirely below the floor vanish, and a lower
/// bound reaching the floor widens to unbounded.
fn strip_unsupported_floor(versions: &VersionList) -> VersionList {
    let floor = Version::new(OLDEST_SUPPORTED_PYTHON.to_vec());
    let mut ranges: Vec<VersionRange> = versions.iter().cloned().collect();
    ranges.retain(|range| !matches!(&range.hi, Some(hi) if *hi <= floor));
    if let Some(first) = ranges.first_mut() {
        let reaches_floor = match &first.lo {
            None => true,
            Some(lo) => *lo <= floor,
        };
        if reaches_floor {
            first.lo = None;
        }
    }
    VersionList::from(ranges)
}

fn evaluate_extra(op: MarkerOp, value: &str) -> Evaluation {
    if !regex_is_match!(r"^[A-Za-z0-9][A-Za-z0-9._-]*$", value) {
        warn!("could not use `{value}` as a variant name");
        return Evaluation::Indeterminate;
    }
    match op {
        MarkerOp::Equal => Evaluation::When(Disjunction::single(
            ConditionSpec::with_variant(value, true),
        )),
        MarkerOp::NotEqual => Evaluation::When(Disjunction::single(
            ConditionSpec::with_variant(value, false),
        )),
        _ => Evaluation::Indeterminate,
    }
}
