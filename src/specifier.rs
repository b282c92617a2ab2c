//! # Source-Scheme Version Specifiers
//!
//! A specifier set is the conjunction of comparison clauses a requirement
//! uses to describe acceptable versions, e.g. `>=1.0,<2.0,!=1.3.*`.
//!
//! ## Supported operators
//!
//! `==`, `!=`, `<`, `<=`, `>`, `>=`, `~=` (compatible release), and the
//! wildcard forms `==X.Y.*` / `!=X.Y.*`. The arbitrary-equality operator
//! `===` is treated as `==`.
//!
//! ## Matching semantics
//!
//! Matching follows the source ecosystem's rules, with pre-releases always
//! eligible (the caller filters candidates against a known-version universe,
//! so there is no separate pre-release opt-in here):
//!
//! - `==`/`!=` pad the shorter release with zeros (`==1.0` matches `1.0.0`)
//!   and ignore the candidate's local suffix unless the clause itself
//!   carries one.
//! - `<` does not admit a pre-release of the boundary version unless the
//!   boundary is itself a pre-release; `>` symmetrically refuses
//!   post-releases and local variants of the boundary.
//! - `~=X.Y.Z` means `>=X.Y.Z` combined with `==X.Y.*`, and requires at
//!   least two release segments.

use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, multispace0},
    combinator::{eof, opt},
    multi::separated_list1,
    sequence::{delimited, pair, terminated},
};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::pip::Version;

/// A single version comparison clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
#[non_exhaustive]
pub enum Specifier {
    /// The compatible-release clause (`~=`): upgrades that keep the
    /// specified prefix, i.e. `~=2.5.1` means `>=2.5.1, ==2.5.*`.
    Compatible(Version),

    /// Exact equality (`==`), with zero-padded release comparison.
    Equal(Version),

    /// Prefix equality (`==X.Y.*`).
    EqualStar(Version),

    /// Exact inequality (`!=`).
    NotEqual(Version),

    /// Prefix inequality (`!=X.Y.*`).
    NotEqualStar(Version),

    /// Strictly less than (`<`).
    Less(Version),

    /// Less than or equal (`<=`).
    LessOrEqual(Version),

    /// Strictly greater than (`>`).
    Greater(Version),

    /// Greater than or equal (`>=`).
    GreaterOrEqual(Version),
}

impl Specifier {
    /// The boundary version of the clause.
    pub fn version(&self) -> &Version {
        match self {
            Specifier::Compatible(v)
            | Specifier::Equal(v)
            | Specifier::EqualStar(v)
            | Specifier::NotEqual(v)
            | Specifier::NotEqualStar(v)
            | Specifier::Less(v)
            | Specifier::LessOrEqual(v)
            | Specifier::Greater(v)
            | Specifier::GreaterOrEqual(v) => v,
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            Specifier::Compatible(_) => "~=",
            Specifier::Equal(_) => "==",
            Specifier::EqualStar(_) => "==",
            Specifier::NotEqual(_) => "!=",
            Specifier::NotEqualStar(_) => "!=",
            Specifier::Less(_) => "<",
            Specifier::LessOrEqual(_) => "<=",
            Specifier::Greater(_) => ">",
            Specifier::GreaterOrEqual(_) => ">=",
        }
    }

    /// Evaluates whether a version satisfies this clause.
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Specifier::Compatible(s) => {
                let floor = Specifier::GreaterOrEqual(s.clone());
                let prefix = Version::builder()
                    .epoch(s.epoch)
                    .release(s.release[..s.release.len().saturating_sub(1)].to_vec())
                    .build();
                floor.matches(version) && Specifier::EqualStar(prefix).matches(version)
            }
            Specifier::Equal(s) => {
                if s.local.is_empty() {
                    version.without_local() == *s
                } else {
                    version == s
                }
            }
            Specifier::NotEqual(s) => !Specifier::Equal(s.clone()).matches(version),
            Specifier::EqualStar(s) => {
                version.epoch == s.epoch
                    && (0..s.release.len()).all(|i| {
                        version.release.get(i).copied().unwrap_or(0)
                            == s.release.get(i).copied().unwrap_or(0)
                    })
            }
            Specifier::NotEqualStar(s) => !Specifier::EqualStar(s.clone()).matches(version),
            Specifier::Less(s) => {
                // A pre-release of the boundary is not "less" unless the
                // boundary is itself a pre-release.
                version < s
                    && !(version.is_prerelease()
                        && !s.is_prerelease()
                        && same_base(version, s))
            }
            Specifier::LessOrEqual(s) => version.without_local() <= *s,
            Specifier::Greater(s) => {
                version > s
                    && !(version.post.is_some() && s.post.is_none() && same_base(version, s))
                    && !(!version.local.is_empty() && same_base(version, s))
            }
            Specifier::GreaterOrEqual(s) => version.without_local() >= *s,
        }
    }
}

/// True when both versions share epoch and (zero-padded) release segments.
fn same_base(lhs: &Version, rhs: &Version) -> bool {
    lhs.epoch == rhs.epoch
        && (0..lhs.release.len().max(rhs.release.len())).all(|i| {
            lhs.release.get(i).copied().unwrap_or(0) == rhs.release.get(i).copied().unwrap_or(0)
        })
}

impl std::fmt::Display for Specifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Specifier::EqualStar(v) | Specifier::NotEqualStar(v) => {
                write!(f, "{}{}.*", self.operator(), v)
            }
            _ => write!(f, "{}{}", self.operator(), self.version()),
        }
    }
}

/// A conjunction of [`Specifier`] clauses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub struct SpecifierSet(Vec<Specifier>);

impl SpecifierSet {
    /// Iterate over the clauses in the set.
    pub fn iter(&self) -> impl Iterator<Item = &Specifier> {
        self.0.iter()
    }

    /// Evaluates whether a version satisfies every clause in the set.
    ///
    /// Short-circuits on the first failing clause.
    pub fn all_match(&self, version: &Version) -> bool {
        self.0.iter().all(|specifier| specifier.matches(version))
    }
}

impl From<Vec<Specifier>> for SpecifierSet {
    fn from(specifiers: Vec<Specifier>) -> Self {
        Self(specifiers)
    }
}

impl From<Specifier> for SpecifierSet {
    fn from(specifier: Specifier) -> Self {
        Self(vec![specifier])
    }
}

impl std::fmt::Display for SpecifierSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for specifier in &self.0 {
            if first {
                first = false;
                write!(f, "{specifier}")?;
            } else {
                write!(f, ",{specifier}")?;
            }
        }
        Ok(())
    }
}

pub(crate) fn specifier_set(input: &str) -> IResult<&str, SpecifierSet> {
    fn operator(input: &str) -> IResult<&str, &str> {
        alt((
            tag("==="),
            tag("=="),
            tag("!="),
            tag(">="),
            tag("<="),
            tag("~="),
            tag(">"),
            tag("<"),
        ))
        .parse(input)
    }

    fn clause(input: &str) -> IResult<&str, Specifier> {
        let (rest, (op, version)) = pair(
            delimited(multispace0, operator, multispace0),
            Version::parser,
        )
        .parse(input)?;
        let (rest, star) = opt(tag(".*")).parse(rest)?;

        let fail = || {
            nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::Verify))
        };

        let specifier = if star.is_some() {
            // The wildcard attaches to a bare release prefix only.
            if !version.is_plain_release() {
                return Err(fail());
            }
            match op {
                "==" | "===" => Specifier::EqualStar(version),
                "!=" => Specifier::NotEqualStar(version),
                _ => return Err(fail()),
            }
        } else {
            match op {
                // The `===` operator ought to compare textually; close
                // enough to `==` for every version this crate models.
                "==" | "===" => Specifier::Equal(version),
                "!=" => Specifier::NotEqual(version),
                ">" => Specifier::Greater(version),
                ">=" => Specifier::GreaterOrEqual(version),
                "<" => Specifier::Less(version),
                "<=" => Specifier::LessOrEqual(version),
                "~=" => {
                    if version.release.len() < 2 || !version.local.is_empty() {
                        return Err(fail());
                    }
                    Specifier::Compatible(version)
                }
                _ => return Err(fail()),
            }
        };

        Ok((rest, specifier))
    }

    let (input, clauses) = separated_list1(
        delimited(multispace0, char(','), multispace0),
        clause,
    )
    .parse(input)?;

    Ok((input, SpecifierSet::from(clauses)))
}

impl FromStr for SpecifierSet {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (_, set) = terminated(specifier_set, (multispace0, eof))
            .parse(input.trim())
            .map_err(|e| ParseError::Specifier {
                input: input.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use simple_test_case::test_case;

    use super::*;

    fn v(s: &str) -> Version {
        s.parse().expect("must parse version")
    }

    fn set(s: &str) -> SpecifierSet {
        s.parse().expect("must parse specifier set")
    }

    #[test_case("==1.0.0", SpecifierSet::from(Specifier::Equal(v("1.0.0"))); "equal")]
    #[test_case("=== 3.0.0", SpecifierSet::from(Specifier::Equal(v("3.0.0"))); "arbitrary_equal")]
    #[test_case("~= 2.5", SpecifierSet::from(Specifier::Compatible(v("2.5"))); "compatible")]
    #[test_case("!=1.9.3", SpecifierSet::from(Specifier::NotEqual(v("1.9.3"))); "not_equal")]
    #[test_case("==1.2.*", SpecifierSet::from(Specifier::EqualStar(v("1.2"))); "equal_star")]
    #[test_case("!=1.2.*", SpecifierSet::from(Specifier::NotEqualStar(v("1.2"))); "not_equal_star")]
    #[test_case("> 1.0.0a1", SpecifierSet::from(Specifier::Greater(v("1.0.0a1"))); "greater_prerelease")]
    #[test_case(
        ">= 1.0, < 2.0",
        SpecifierSet::from(vec![
            Specifier::GreaterOrEqual(v("1.0")),
            Specifier::Less(v("2.0")),
        ]);
        "conjunction"
    )]
    #[test]
    fn parsing(input: &str, expected: SpecifierSet) {
        assert_eq!(expected, set(input));
    }

    #[test_case("$%!@#"; "garbage")]
    #[test_case(">>= 1.0"; "invalid_operator")]
    #[test_case("~= "; "missing_version")]
    #[test_case(">= 1.0,"; "trailing_comma")]
    #[test_case("~= 1"; "compatible_single_segment")]
    #[test_case(">=1.2.*"; "wildcard_after_ordered_operator")]
    #[test_case("==1.2a1.*"; "wildcard_after_prerelease")]
    #[test]
    fn parsing_failure(input: &str) {
        input.parse::<SpecifierSet>().expect_err("must not parse");
    }

    #[test_case("==1.0.0", "1.0.0", true; "equal_same")]
    #[test_case("==1.0", "1.0.0", true; "equal_zero_padded")]
    #[test_case("==1.0.0", "1.0.0+local", true; "equal_ignores_candidate_local")]
    #[test_case("==1.0.0+other", "1.0.0+local", false; "equal_respects_clause_local")]
    #[test_case("==1.0.0", "1.0.0.post1", false; "equal_rejects_post")]
    #[test_case("!=1.0.0", "1.0.1", true; "not_equal")]
    #[test_case("==1.2.*", "1.2.3", true; "star_inside")]
    #[test_case("==1.2.*", "1.2.0a1", true; "star_prerelease_inside")]
    #[test_case("==1.2.*", "1.3.0", false; "star_outside")]
    #[test_case("==1.2.0.*", "1.2", true; "star_zero_padded")]
    #[test_case("!=1.2.*", "1.3.0", true; "not_star_outside")]
    #[test_case("<2.0.0", "1.9.9", true; "less")]
    #[test_case("<2.0.0", "2.0.0rc1", false; "less_refuses_boundary_prerelease")]
    #[test_case("<2.0.0", "1.9.9rc1", true; "less_allows_other_prerelease")]
    #[test_case("<2.0.0rc2", "2.0.0rc1", true; "less_prerelease_boundary")]
    #[test_case("<2.0.0", "2.0.0.dev1", false; "less_refuses_boundary_dev")]
    #[test_case(">1.7", "1.7.0.post1", false; "greater_refuses_boundary_post")]
    #[test_case(">1.7", "1.7.1", true; "greater_allows_higher_patch")]
    #[test_case(">1.7.post1", "1.7.post2", true; "greater_post_boundary")]
    #[test_case(">1.7", "1.7.0+local", false; "greater_refuses_boundary_local")]
    #[test_case(">=1.0", "1.0.0", true; "greater_equal_same")]
    #[test_case(">=1.0", "0.9", false; "greater_equal_below")]
    #[test_case("<=2.0", "2.0.0", true; "less_equal_same")]
    #[test_case("~=2.5", "2.5.9", true; "compatible_within_major")]
    #[test_case("~=2.5", "3.0", false; "compatible_next_major")]
    #[test_case("~=1.4.5", "1.4.9", true; "compatible_within_minor")]
    #[test_case("~=1.4.5", "1.5.0", false; "compatible_next_minor")]
    #[test_case("~=1.4.5", "1.4.4", false; "compatible_below_floor")]
    #[test]
    fn matching(clause: &str, version: &str, expected: bool) {
        let set = set(clause);
        assert_eq!(
            set.all_match(&v(version)),
            expected,
            "version '{version}' against '{set}'"
        );
    }

    #[test_case(">=1.0,<2.0", "1.5", true; "range_inside")]
    #[test_case(">=1.0,<2.0", "2.5", false; "range_outside")]
    #[test_case(">=1.0,<2.0,!=1.3", "1.3.0", false; "range_excluded")]
    #[test]
    fn conjunction(clauses: &str, version: &str, expected: bool) {
        assert_eq!(set(clauses).all_match(&v(version)), expected);
    }

    #[test_case(">=1.0,<2.0,!=1.3.*"; "ops")]
    #[test_case("~=2.5,!=2.5.1"; "compatible")]
    #[test]
    fn display_roundtrip(input: &str) {
        let parsed = set(input);
        assert_eq!(input, parsed.to_string());
        assert_eq!(parsed, set(&parsed.to_string()));
    }
}
