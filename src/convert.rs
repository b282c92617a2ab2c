//! # Requirement Conversion
//!
//! Turns one source requirement (name, extras, version specifier, marker)
//! into the target constraint pairs it denotes. A single requirement can
//! expand into several `(dependency, condition)` pairs when its marker
//! evaluates to a disjunction of conditions.

use std::collections::BTreeSet;
use std::str::FromStr;

use bon::Builder;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{eof, opt},
    multi::separated_list1,
    sequence::{delimited, preceded, terminated},
};
use serde::{Deserialize, Serialize};

use crate::PackageName;
use crate::error::{ConversionError, ParseError};
use crate::evaluate::{Evaluation, evaluate_marker};
use crate::marker::{MarkerExpr, marker};
use crate::provider::VersionOracle;
use crate::spec::{ConditionSpec, DependencySpec, Disjunction};
use crate::specifier::{SpecifierSet, specifier_set};

/// A dependency requirement as declared by a source package: name,
/// requested extras, version specifier, environment marker.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct Requirement {
    /// The dependency's registry name.
    #[builder(into)]
    pub name: String,

    /// Optional features requested of the dependency.
    #[builder(default, into)]
    pub extras: BTreeSet<String>,

    /// Acceptable dependency versions; `None` accepts any.
    pub specifier: Option<SpecifierSet>,

    /// The environment condition gating the requirement; `None` always
    /// applies.
    pub marker: Option<MarkerExpr>,
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        if let Some(specifier) = &self.specifier {
            write!(f, "{specifier}")?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}

fn requirement(input: &str) -> IResult<&str, Requirement> {
    fn name(input: &str) -> IResult<&str, &str> {
        take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .parse(input)
    }

    fn extras(input: &str) -> IResult<&str, Vec<&str>> {
        delimited(
            (char('['), multispace0),
            separated_list1(delimited(multispace0, char(','), multispace0), name),
            (multispace0, char(']')),
        )
        .parse(input)
    }

    fn specifiers(input: &str) -> IResult<&str, SpecifierSet> {
        let parenthesized = delimited(
            (char('('), multispace0),
            specifier_set,
            (multispace0, char(')')),
        );
        preceded(multispace0, alt((parenthesized, specifier_set))).parse(input)
    }

    let (input, name_str) = preceded(multispace0, name).parse(input)?;
    let (input, extra_list) = opt(extras).parse(input)?;
    let (input, specifier) = opt(specifiers).parse(input)?;
    let (input, marker_expr) =
        opt(preceded((multispace0, char(';'), multispace0), marker)).parse(input)?;

    Ok((
        input,
        Requirement {
            name: name_str.to_string(),
            extras: extra_list
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect(),
            specifier,
            marker: marker_expr,
        },
    ))
}

impl FromStr for Requirement {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (_, parsed) = terminated(requirement, (multispace0, eof))
            .parse(input)
            .map_err(|e| ParseError::Requirement {
                input: input.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(parsed)
    }
}

/// Convert a source requirement into its target constraint pairs.
///
/// The returned list holds one `(dependency, condition)` pair per marker
/// alternative; it is empty when the marker can never hold (the requirement
/// is correctly dropped, which is not an error).
///
/// Errors distinguish the untranslatable cases: a marker with no target
/// equivalent, a specifier no known release satisfies (a real upstream
/// conflict), or a failed version lookup.
///
/// `from_extra` names the optional feature of the *requesting* package this
/// requirement was declared under; it is conjoined onto every condition. An
/// alternative contradicting the feature flag (a `extra != x` marker under
/// extra `x`) is dropped.
#[tracing::instrument(skip(oracle))]
pub fn convert_requirement(
    requirement: &Requirement,
    oracle: &VersionOracle<'_>,
    from_extra: Option<&str>,
) -> Result<Vec<(DependencySpec, ConditionSpec)>, ConversionError> {
    let mut conditions = Disjunction::trivial();
    if let Some(marker) = &requirement.marker {
        match evaluate_marker(marker, oracle) {
            Evaluation::Always => {}
            Evaluation::Never => return Ok(Vec::new()),
            Evaluation::When(alternatives) => conditions = alternatives,
            Evaluation::Indeterminate => {
                return Err(ConversionError::UnevaluableMarker {
                    requirement: requirement.to_string(),
                    from_extra: from_extra.map(str::to_string),
                });
            }
        }
    }

    let mut dependency = DependencySpec::new(PackageName::from_pypi(&requirement.name));
    for extra in &requirement.extras {
        dependency.add_variant(extra);
    }

    if let Some(specifier) = &requirement.specifier {
        let versions = oracle
            .matching(&requirement.name, specifier)
            .map_err(|source| ConversionError::Provider {
                requirement: requirement.to_string(),
                source,
            })?;
        if versions.is_empty() {
            return Err(ConversionError::NoMatchingVersions {
                requirement: requirement.to_string(),
                from_extra: from_extra.map(str::to_string),
            });
        }
        dependency.set_versions(versions);
    }

    let mut pairs = Vec::new();
    for mut condition in conditions.into_alternatives() {
        if let Some(extra) = from_extra {
            let flag = ConditionSpec::with_variant(extra, true);
            if condition.constrain(&flag).is_err() {
                continue;
            }
        }
        pairs.push((dependency.clone(), condition));
    }
    Ok(pairs)
}
