//! # Source-Scheme (PyPI) Version Model
//!
//! Parses and orders package versions the way the source ecosystem does.
//! This is the representation every collaborator hands to the core: known
//! version lists, specifier boundary versions, and python-version marker
//! literals all arrive as [`Version`] values.
//!
//! ## Version format
//!
//! Versions follow the structure `[N!]N(.N)*[{a|b|rc|...}N][.postN][.devN][+local]`,
//! for example `1!2.3.4a5.post6.dev7`:
//!
//! - **Epoch**: `N!` — overrides normal ordering (defaults to `0!`).
//! - **Release**: `N(.N)*` — the core version numbers.
//! - **Pre-release**: `a1` (alpha), `b2` (beta), `rc3`, with the usual
//!   spelling aliases (`alpha`, `beta`, `c`, `pre`, `preview`).
//! - **Post-release**: `.post1`, aliases `r`/`rev`, or the implicit `-1`.
//! - **Development release**: `.dev1`.
//! - **Local version**: `+tokens.separated.by.dots` (also `-`/`_`).
//!
//! ## Ordering
//!
//! Epoch first, then release segments numerically with implicit zero
//! padding. At equal release: a dev-only version sorts below every
//! pre-release, pre-releases (`a` < `b` < `rc`) sort below the final
//! release, post-releases sort above it, and a dev suffix breaks ties
//! downwards within the same pre/post stage. Local segments compare
//! lexicographically with numeric tokens above alphanumeric ones.
//!
//! ## Supported subset
//!
//! Only release-only and release-plus-single-pre-release versions convert
//! faithfully into the target scheme. [`Version::is_supported`] flags
//! versions that additionally combine a pre-release with post/dev/local
//! suffixes; the interval synthesizer excludes those from its computations.

use std::cmp::Ordering;
use std::str::FromStr;

use bon::Builder;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, u32, u64},
    combinator::{eof, opt, value},
    multi::separated_list1,
    sequence::{preceded, terminated},
};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::version::{LocalSegment, Prerelease};

/// A version in the source scheme.
///
/// See the [module docs](self) for format and ordering rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder, Serialize, Deserialize)]
pub struct Version {
    /// The epoch of the version; almost always 0, which is the default.
    /// A project that restarts its versioning scheme increments the epoch
    /// so that every new-scheme version sorts after every old-scheme one.
    #[builder(default = 0)]
    pub epoch: u32,

    /// The release segments, most significant first.
    #[builder(default, into)]
    pub release: Vec<u64>,

    /// An optional pre-release qualifier.
    pub pre: Option<Prerelease>,

    /// An optional post-release number.
    pub post: Option<u64>,

    /// An optional dev-release number.
    pub dev: Option<u64>,

    /// Local-version tokens; empty for almost all versions.
    #[builder(default, into)]
    pub local: Vec<LocalSegment>,
}

impl Version {
    /// True when the version can be represented faithfully in the target
    /// scheme: either no pre-release, or a pre-release with no other
    /// qualifiers.
    pub fn is_supported(&self) -> bool {
        self.pre.is_none()
            || (self.post.is_none() && self.dev.is_none() && self.local.is_empty())
    }

    /// True when the version carries a pre-release or dev-release
    /// qualifier.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// True when the version is a bare release with no qualifiers.
    pub fn is_plain_release(&self) -> bool {
        self.pre.is_none() && self.post.is_none() && self.dev.is_none() && self.local.is_empty()
    }

    /// Release segment at `index`, implicitly zero beyond the last one.
    fn segment(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    /// The version without its local suffix, for specifier comparisons
    /// that ignore local tokens.
    pub(crate) fn without_local(&self) -> Version {
        Version {
            local: Vec::new(),
            ..self.clone()
        }
    }

    /// Pre-release stage used for ordering at equal release segments:
    /// dev-only versions sort below all pre-releases, final and
    /// post-releases above them.
    fn pre_stage(&self) -> (u8, Option<Prerelease>) {
        match (&self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(*pre)),
            (None, _, _) => (2, None),
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let cmp = self.epoch.cmp(&other.epoch);
        if cmp != Ordering::Equal {
            return cmp;
        }

        let segments = self.release.len().max(other.release.len());
        for i in 0..segments {
            let cmp = self.segment(i).cmp(&other.segment(i));
            if cmp != Ordering::Equal {
                return cmp;
            }
        }

        let cmp = self.pre_stage().cmp(&other.pre_stage());
        if cmp != Ordering::Equal {
            return cmp;
        }

        // Post-release presence sorts higher.
        let post = |v: &Self| v.post.map(|n| (1u8, n)).unwrap_or((0, 0));
        let cmp = post(self).cmp(&post(other));
        if cmp != Ordering::Equal {
            return cmp;
        }

        // Dev-release presence sorts lower.
        let dev = |v: &Self| v.dev.map(|n| (0u8, n)).unwrap_or((1, 0));
        let cmp = dev(self).cmp(&dev(other));
        if cmp != Ordering::Equal {
            return cmp;
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
        if self.epoch > 0 {
            write!(f, "{}!", self.epoch)?;
        }
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
            let label = match pre {
                Prerelease::Alpha(_) => "a",
                Prerelease::Beta(_) => "b",
                Prerelease::Rc(_) => "rc",
            };
            write!(f, "{label}{}", pre.number())?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        let mut separator = '+';
        for token in &self.local {
            write!(f, "{separator}{token}")?;
            separator = '.';
        }
        Ok(())
    }
}

impl Version {
    pub(crate) fn parser(input: &str) -> IResult<&str, Version> {
        fn separator(input: &str) -> IResult<&str, ()> {
            value((), opt(alt((char('.'), char('-'), char('_'))))).parse(input)
        }

        fn epoch(input: &str) -> IResult<&str, u32> {
            terminated(u32, char('!')).parse(input)
        }

        fn pre_release(input: &str) -> IResult<&str, Prerelease> {
            fn alpha(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) = alt((tag("alpha"), tag("a"))).parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Alpha(number.unwrap_or(0))))
            }
            fn beta(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) = alt((tag("beta"), tag("b"))).parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Beta(number.unwrap_or(0))))
            }
            fn rc(input: &str) -> IResult<&str, Prerelease> {
                let (input, _) =
                    alt((tag("preview"), tag("pre"), tag("rc"), tag("c"))).parse(input)?;
                let (input, number) = opt(u64).parse(input)?;
                Ok((input, Prerelease::Rc(number.unwrap_or(0))))
            }
            preceded(separator, alt((alpha, beta, rc))).parse(input)
        }

        fn explicit_post_release(input: &str) -> IResult<&str, u64> {
            let (input, _) = separator(input)?;
            let (input, _) = alt((tag("post"), tag("rev"), tag("r"))).parse(input)?;
            let (input, number) = opt(u64).parse(input)?;
            Ok((input, number.unwrap_or(0)))
        }

        fn implicit_post_release(input: &str) -> IResult<&str, u64> {
            preceded(char('-'), u64).parse(input)
        }

        fn dev_release(input: &str) -> IResult<&str, u64> {
            let (input, _) = separator(input)?;
            let (input, _) = tag("dev").parse(input)?;
            let (input, number) = opt(u64).parse(input)?;
            Ok((input, number.unwrap_or(0)))
        }

        fn local_segment(input: &str) -> IResult<&str, LocalSegment> {
            let (input, token) =
                take_while1(|c: char| c.is_ascii_alphanumeric()).parse(input)?;
            let segment = match token.parse::<u64>() {
                Ok(n) => LocalSegment::Num(n),
                Err(_) => LocalSegment::Str(token.to_ascii_lowercase()),
            };
            Ok((input, segment))
        }

        fn local(input: &str) -> IResult<&str, Vec<LocalSegment>> {
            fn local_separator(input: &str) -> IResult<&str, ()> {
                value((), alt((char('.'), char('-'), char('_')))).parse(input)
            }
            preceded(
                char('+'),
                separated_list1(local_separator, local_segment),
            )
            .parse(input)
        }

        let (input, _) = opt(tag("v")).parse(input)?;
        let (input, epoch) = opt(epoch).parse(input)?;
        let (input, release) = separated_list1(char('.'), u64).parse(input)?;
        let (input, pre) = opt(pre_release).parse(input)?;
        let (input, post) =
            opt(alt((explicit_post_release, implicit_post_release))).parse(input)?;
        let (input, dev) = opt(dev_release).parse(input)?;
        let (input, local) = opt(local).parse(input)?;

        Ok((
            input,
            Version {
                epoch: epoch.unwrap_or(0),
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

    macro_rules! version {
        ($($field:ident = $value:expr),*) => {
            Version::builder()
                $(.$field($value))*
                .build()
        };
    }

    fn v(s: &str) -> Version {
        s.parse().expect("must parse version")
    }

    #[test_case("1.2.3", version!(release = [1, 2, 3]); "simple")]
    #[test_case("v1.2.3", version!(release = [1, 2, 3]); "v_prefix")]
    #[test_case("1!2.3.4", version!(epoch = 1, release = [2, 3, 4]); "epoch")]
    #[test_case("3", version!(release = [3]); "single_segment")]
    #[test_case("1.2.3a5", version!(release = [1, 2, 3], pre = Prerelease::Alpha(5)); "alpha_short")]
    #[test_case("1.2.3.alpha5", version!(release = [1, 2, 3], pre = Prerelease::Alpha(5)); "alpha_dotted")]
    #[test_case("1.2.3-beta", version!(release = [1, 2, 3], pre = Prerelease::Beta(0)); "beta_implicit_zero")]
    #[test_case("1.2.3_pre4", version!(release = [1, 2, 3], pre = Prerelease::Rc(4)); "pre_is_rc")]
    #[test_case("1.2.3.preview2", version!(release = [1, 2, 3], pre = Prerelease::Rc(2)); "preview_is_rc")]
    #[test_case("1.2.3c1", version!(release = [1, 2, 3], pre = Prerelease::Rc(1)); "c_is_rc")]
    #[test_case("1.2.3.post5", version!(release = [1, 2, 3], post = 5); "post")]
    #[test_case("1.2.3.rev5", version!(release = [1, 2, 3], post = 5); "rev_is_post")]
    #[test_case("1.2.3-1", version!(release = [1, 2, 3], post = 1); "implicit_post")]
    #[test_case("1.2.3.dev6", version!(release = [1, 2, 3], dev = 6); "dev")]
    #[test_case(
        "1.2.3+ubuntu.1",
        version!(release = [1, 2, 3], local = vec![LocalSegment::Str("ubuntu".into()), LocalSegment::Num(1)]);
        "local"
    )]
    #[test_case(
        "1!2.3.4a5.post6.dev7",
        version!(epoch = 1, release = [2, 3, 4], pre = Prerelease::Alpha(5), post = 6, dev = 7);
        "everything"
    )]
    #[test]
    fn parsing(input: &str, expected: Version) {
        assert_eq!(expected, v(input));
    }

    #[test_case("$%!"; "garbage")]
    #[test_case("1.2.3 !!"; "trailing_garbage")]
    #[test_case(""; "empty")]
    #[test_case("."; "bare_dot")]
    #[test]
    fn parsing_failure(input: &str) {
        input.parse::<Version>().expect_err("must not parse");
    }

    #[test_case("1.0.0", "1.0.0", Ordering::Equal; "equal")]
    #[test_case("1.0", "1.0.0", Ordering::Equal; "zero_padded_equal")]
    #[test_case("1.1.0", "1.0.0", Ordering::Greater; "greater_minor")]
    #[test_case("1.2", "1.10", Ordering::Less; "numeric_segments")]
    #[test_case("1.0.0", "1.0.0a1", Ordering::Greater; "final_above_prerelease")]
    #[test_case("1.0.0a1", "1.0.0b1", Ordering::Less; "alpha_below_beta")]
    #[test_case("1.0.0b1", "1.0.0rc1", Ordering::Less; "beta_below_rc")]
    #[test_case("1.0.0.post1", "1.0.0", Ordering::Greater; "post_above_final")]
    #[test_case("1.0.0.dev1", "1.0.0", Ordering::Less; "dev_below_final")]
    #[test_case("1.0.0.dev1", "1.0.0a1", Ordering::Less; "dev_below_prerelease")]
    #[test_case("1.0.0a2.dev1", "1.0.0a1", Ordering::Greater; "dev_ties_within_prerelease")]
    #[test_case("1.0.0a2.dev1", "1.0.0a2", Ordering::Less; "dev_below_its_prerelease")]
    #[test_case("1.0.0.post1.dev1", "1.0.0.post1", Ordering::Less; "dev_below_its_post")]
    #[test_case("1!1.0.0", "2.0.0", Ordering::Greater; "epoch_dominates")]
    #[test_case("1.0.0+local", "1.0.0", Ordering::Greater; "local_above_bare")]
    #[test_case("1.0.0+abc", "1.0.0+2", Ordering::Less; "numeric_local_above_alpha")]
    #[test]
    fn ordering(lhs: &str, rhs: &str, expected: Ordering) {
        assert_eq!(v(lhs).cmp(&v(rhs)), expected, "{lhs} vs {rhs}");
    }

    #[test_case("1.2.3", true; "plain")]
    #[test_case("1.2.3a1", true; "pre_only")]
    #[test_case("1.2.3.post1.dev2+l", true; "suffixes_without_pre")]
    #[test_case("1.2.3a1.post1", false; "pre_with_post")]
    #[test_case("1.2.3a1.dev1", false; "pre_with_dev")]
    #[test_case("1.2.3a1+l", false; "pre_with_local")]
    #[test]
    fn supported(input: &str, expected: bool) {
        assert_eq!(v(input).is_supported(), expected);
    }

    #[test_case("1!2.3.4a5.post6.dev7+l.8"; "everything")]
    #[test_case("1.2.3"; "plain")]
    #[test_case("1.2.3rc4"; "rc")]
    #[test]
    fn display_roundtrip(input: &str) {
        assert_eq!(input, v(input).to_string());
    }
}
