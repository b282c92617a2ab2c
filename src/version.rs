//! # Target-Scheme Version Model
//!
//! The Spack-side representation of a package version, together with the
//! adapter that converts a parsed PyPI version into it.
//!
//! ## Ordering
//!
//! Target versions are totally ordered:
//!
//! 1. Release segments, pointwise, with the shorter version implicitly
//!    zero-padded (`2` == `2.0` == `2.0.0`).
//! 2. Pre-release: absence sorts *after* presence, so a final release is
//!    greater than any of its pre-releases; `alpha` < `beta` < `rc`, then by
//!    sequence number.
//! 3. Post-release: presence sorts higher.
//! 4. Dev-release: presence sorts lower than no-dev.
//! 5. Local segments: lexicographic, numeric tokens above alphanumeric ones.
//!
//! Note that this deliberately diverges from the source scheme for
//! dev-releases: the target ecosystem treats a dev suffix as a
//! post-release-style qualifier, so `1.0a1 < 1.0.dev1 < 1.0 < 1.0.post1`
//! here. Only release-only and release-plus-pre-release versions are fully
//! supported; for those the two orderings coincide.
//!
//! ## Canonical text
//!
//! [`Display`](std::fmt::Display) renders the canonical target form
//! (`1.2.3-alpha5`, `1.2.3.post1`, `1.2.3-ubuntu.1`) and [`FromStr`] parses
//! it back, so the target ecosystem's own comparator sorts these strings
//! exactly as this module does.

use std::cmp::Ordering;
use std::str::FromStr;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, u64},
    combinator::{eof, opt},
    multi::separated_list1,
    sequence::{preceded, terminated},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ParseError, UnsupportedVersion};
use crate::pip;

/// A pre-release qualifier: kind plus sequence number.
///
/// The derived ordering is the semantic one: `alpha` < `beta` < `rc`,
/// then by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prerelease {
    /// An alpha pre-release, e.g. `1.2.0-alpha3`.
    Alpha(u64),

    /// A beta pre-release, e.g. `1.2.0-beta1`.
    Beta(u64),

    /// A release candidate, e.g. `1.2.0-rc2`.
    Rc(u64),
}

impl Prerelease {
    fn label(&self) -> &'static str {
        match self {
            Prerelease::Alpha(_) => "alpha",
            Prerelease::Beta(_) => "beta",
            Prerelease::Rc(_) => "rc",
        }
    }

    /// The sequence number of the pre-release.
    pub fn number(&self) -> u64 {
        match self {
            Prerelease::Alpha(n) | Prerelease::Beta(n) | Prerelease::Rc(n) => *n,
        }
    }
}

impl std::fmt::Display for Prerelease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.label(), self.number())
    }
}

/// One token of a local-version suffix.
///
/// Numeric tokens sort above alphanumeric tokens; the derived ordering
/// (variant order, then payload) encodes exactly that.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalSegment {
    /// An alphanumeric token, e.g. the `ubuntu` in `1.2+ubuntu.1`.
    Str(String),

    /// A numeric token, e.g. the `1` in `1.2+ubuntu.1`.
    Num(u64),
}

impl std::fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocalSegment::Str(s) => write!(f, "{s}"),
            LocalSegment::Num(n) => write!(f, "{n}"),
        }
    }
}

/// A version in the target scheme.
///
/// Built either from its canonical text via [`FromStr`] or from a source
/// version via [`Version::from_pip`]. The release segments carry a prepended
/// epoch when the source version had a non-zero one (partial support; see
/// [`Version::from_pip`]).
///
/// Equality is structural: `2.0` and `2` are distinct versions (they render
/// differently), while the *ordering* pads with zeros and compares them as
/// equal. Use `cmp(..).is_eq()` where ordering-equality is meant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    /// Numeric release segments, most significant first.
    pub release: Vec<u64>,

    /// Optional pre-release qualifier.
    pub pre: Option<Prerelease>,

    /// Optional post-release number.
    pub post: Option<u64>,

    /// Optional dev-release number.
    pub dev: Option<u64>,

    /// Local-version tokens, empty for almost all versions.
    pub local: Vec<LocalSegment>,
}

impl Version {
    /// Build a release-only version from its segments.
    pub fn new(release: impl Into<Vec<u64>>) -> Self {
        Self {
            release: release.into(),
            ..Self::default()
        }
    }

    /// Release segment at `index`, implicitly zero beyond the last one.
    fn segment(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    /// The release-only prefix of this version, `len` segments long.
    ///
    /// Used by the interval synthesizer to generalize range boundaries:
    /// a prefix compares less-or-equal to any plain version it abbreviates.
    pub(crate) fn prefix(&self, len: usize) -> Self {
        Self::new(&self.release[..len.min(self.release.len())])
    }

    /// True when the version is a bare release with no qualifiers.
    pub fn is_plain_release(&self) -> bool {
        self.pre.is_none() && self.post.is_none() && self.dev.is_none() && self.local.is_empty()
    }

    /// Convert a source version into the target scheme.
    ///
    /// Degradations, mirroring what the target scheme can express:
    ///
    /// - A non-zero epoch is prepended as an extra leading release segment.
    ///   This is an approximation (epoch ordering restarts cannot be
    ///   represented exactly), so it is logged.
    /// - Post-, dev- and local-suffixes are carried over but reordered by
    ///   the target scheme (see the module docs).
    /// - A pre-release combined with any of post/dev/local cannot be ordered
    ///   faithfully and is refused with [`UnsupportedVersion`].
    pub fn from_pip(v: &pip::Version) -> Result<Self, UnsupportedVersion> {
        if !v.is_supported() {
            return Err(UnsupportedVersion {
                version: v.to_string(),
            });
        }

        let mut release = Vec::with_capacity(v.release.len() + 1);
        if v.epoch > 0 {
            warn!("epoch in version {v} is only approximated in the converted version");
            release.push(u64::from(v.epoch));
        }
        release.extend_from_slice(&v.release);

        Ok(Self {
            release,
            pre: v.pre,
            post: v.post,
            dev: v.dev,
            local: v.local.clone(),
        })
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let segments = self.release.len().max(other.release.len());
        for i in 0..segments {
            let cmp = self.segment(i).cmp(&other.segment(i));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }

        // Absence of a pre-release sorts above any pre-release.
        match (&self.pre, &other.pre) {
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(lhs), Some(rhs)) => {
                let cmp = lhs.cmp(rhs);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            (None, None) => {}
        }

        // A post-release sorts above the bare release.
        match (self.post, other.post) {
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(lhs), Some(rhs)) => {
                let cmp = lhs.cmp(&rhs);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            (None, None) => {}
        }

        // A dev-release sorts below the version without one.
        match (self.dev, other.dev) {
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(lhs), Some(rhs)) => {
                let cmp = lhs.cmp(&rhs);
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            (None, None) => {}
        }

        self.local.cmp(&other.local)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for segment in &self.release {
            if first {
                first = false;
                write!(f, "{segment}")?;
            } else {
                write!(f, ".{segment}")?;
            }
        }
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        let mut separator = '-';
        for token in &self.local {
            write!(f, "{separator}{token}")?;
            separator = '.';
        }
        Ok(())
    }
}

impl Version {
    fn parser(input: &str) -> IResult<&str, Version> {
        fn prerelease(input: &str) -> IResult<&str, Prerelease> {
            fn alpha(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) = tag("alpha").parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Alpha(number.unwrap_or(0))))
            }
            fn beta(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) = tag("beta").parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Beta(number.unwrap_or(0))))
            }
            fn rc(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) = tag("rc").parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Rc(number.unwrap_or(0))))
            }
            preceded(char('-'), alt((alpha, beta, rc))).parse(input)
        }

        fn post(input: &str) -> IResult<&str, u64> {
            preceded(tag(".post"), u64).parse(input)
        }

        fn dev(input: &str) -> IResult<&str, u64> {
            preceded(tag(".dev"), u64).parse(input)
        }

        fn local_segment(input: &str) -> IResult<&str, LocalSegment> {
            let (input, token) =
                take_while1(|c: char| c.is_ascii_alphanumeric()).parse(input)?;
            let segment = match token.parse::<u64>() {
                Ok(n) => LocalSegment::Num(n),
                Err(_) => LocalSegment::Str(token.to_string()),
            };
            Ok((input, segment))
        }

        fn local(input: &str) -> IResult<&str, Vec<LocalSegment>> {
            preceded(char('-'), separated_list1(char('.'), local_segment)).parse(input)
        }

        let (input, release) = separated_list1(char('.'), u64).parse(input)?;
        let (input, pre) = opt(prerelease).parse(input)?;
        let (input, post) = opt(post).parse(input)?;
        let (input, dev) = opt(dev).parse(input)?;
        let (input, local) = opt(local).parse(input)?;

        Ok((
            input,
            Version {
                release,
                pre,
                post,
                dev,
                local: local.unwrap_or_default(),
            },
        ))
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (_, version) = terminated(Self::parser, eof)
            .parse(input.trim())
            .map_err(|e| ParseError::Version {
                input: input.to_string(),
                message: format!("{e:?}"),
            })?;
        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use simple_test_case::test_case;

    use super::*;

    fn v(s: &str) -> Version {
        s.parse().expect("must parse version")
    }

    #[test_case("1.2.3"; "plain")]
    #[test_case("1.2.3-alpha5"; "alpha")]
    #[test_case("1.2.3-beta0"; "beta")]
    #[test_case("2.0-rc1"; "rc")]
    #[test_case("1.2.3.post1"; "post")]
    #[test_case("1.2.3.dev2"; "dev")]
    #[test_case("1.2.3.post1.dev2"; "post_and_dev")]
    #[test_case("1.2-ubuntu.1"; "local")]
    #[test]
    fn canonical_text_roundtrip(input: &str) {
        assert_eq!(input, v(input).to_string());
    }

    #[test_case("2", "2.0", Ordering::Equal; "zero_padded_equal")]
    #[test_case("2", "2.0.0", Ordering::Equal; "zero_padded_equal_deep")]
    #[test_case("1.2", "1.10", Ordering::Less; "numeric_not_lexicographic")]
    #[test_case("1.2-alpha1", "1.2", Ordering::Less; "prerelease_before_final")]
    #[test_case("1.2-alpha1", "1.2-beta1", Ordering::Less; "alpha_before_beta")]
    #[test_case("1.2-beta2", "1.2-rc1", Ordering::Less; "beta_before_rc")]
    #[test_case("1.2-rc1", "1.2-rc2", Ordering::Less; "rc_by_number")]
    #[test_case("1.2.post1", "1.2", Ordering::Greater; "post_after_final")]
    #[test_case("1.2.dev1", "1.2", Ordering::Less; "dev_before_final")]
    #[test_case("1.2-alpha1", "1.2.dev1", Ordering::Less; "dev_is_post_style_here")]
    #[test_case("1.2-ubuntu.1", "1.2", Ordering::Greater; "local_after_bare")]
    #[test_case("1.2-ubuntu.1", "1.2-1", Ordering::Less; "numeric_local_above_alpha")]
    #[test_case("1.2-alpha1", "1.2.0", Ordering::Less; "prerelease_of_padded_release")]
    #[test]
    fn ordering(lhs: &str, rhs: &str, expected: Ordering) {
        assert_eq!(v(lhs).cmp(&v(rhs)), expected, "{lhs} vs {rhs}");
    }

    #[test]
    fn prefix_sorts_at_or_below_extensions() {
        let full = v("1.2.3");
        for len in 1..=3 {
            assert!(full.prefix(len) <= full, "prefix({len}) of 1.2.3");
        }
        assert!(v("1.2").prefix(2) <= v("1.2.0"));
    }

    #[test_case("1!2.0", &[1, 2, 0]; "epoch_prepended")]
    #[test_case("2.0", &[2, 0]; "no_epoch")]
    #[test]
    fn adapter_epoch(pip: &str, release: &[u64]) {
        let pip: pip::Version = pip.parse().expect("must parse pip version");
        let converted = Version::from_pip(&pip).expect("must convert");
        assert_eq!(converted.release, release);
    }

    #[test_case("1.2.3a1"; "pre_only_ok")]
    #[test_case("1.2.3.post1"; "post_only_ok")]
    #[test]
    fn adapter_supported(input: &str) {
        let pip: pip::Version = input.parse().expect("must parse pip version");
        Version::from_pip(&pip).expect("must convert");
    }

    #[test_case("1.2.3a1.post1"; "pre_with_post")]
    #[test_case("1.2.3rc1.dev2"; "pre_with_dev")]
    #[test_case("1.2.3b1+local"; "pre_with_local")]
    #[test]
    fn adapter_rejects_mixed_prerelease(input: &str) {
        let pip: pip::Version = input.parse().expect("must parse pip version");
        Version::from_pip(&pip).expect_err("must refuse conversion");
    }

    #[test]
    fn adapter_preserves_ordering_of_supported_versions() {
        let ordered = ["1.0a1", "1.0b2", "1.0rc1", "1.0", "1.0.post1", "1.1", "2.0"];
        let converted: Vec<Version> = ordered
            .iter()
            .map(|s| {
                let pip: pip::Version = s.parse().expect("must parse");
                Version::from_pip(&pip).expect("must convert")
            })
            .collect();
        let mut sorted = converted.clone();
        sorted.sort();
        assert_eq!(converted, sorted);
    }
}
