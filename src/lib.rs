#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

use lazy_regex::regex;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

mod convert;
mod error;
mod evaluate;
mod marker;
mod merge;
pub mod pip;
mod provider;
mod ranges;
mod spec;
mod specifier;
mod version;

pub use convert::*;
pub use error::*;
pub use evaluate::*;
pub use marker::*;
pub use merge::*;
pub use provider::*;
pub use ranges::*;
pub use spec::*;
pub use specifier::*;
pub use version::{LocalSegment, Prerelease, Version};

/// The platforms the target ecosystem enumerates.
///
/// Marker comparisons against platform variables translate into conditions
/// over this closed set; a `!=` comparison expands to the disjunction of
/// the remaining members.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Linux distributions.
    #[strum(serialize = "linux")]
    Linux,

    /// Cray supercomputer frontends.
    #[strum(serialize = "cray")]
    Cray,

    /// macOS.
    #[strum(serialize = "darwin")]
    Darwin,

    /// Windows.
    #[strum(serialize = "windows")]
    Windows,

    /// FreeBSD.
    #[strum(serialize = "freebsd")]
    Freebsd,
}

impl Platform {
    /// Resolve a marker literal (`platform_system` / `sys_platform` value)
    /// into a platform, normalizing the known aliases.
    ///
    /// Returns `None` for literals naming no supported platform; the
    /// evaluator treats those comparisons as statically decided.
    pub fn from_marker_value(value: &str) -> Option<Self> {
        let lowered = value.to_ascii_lowercase();
        let token = match lowered.as_str() {
            "win32" => "windows",
            "linux2" => "linux",
            other => other,
        };
        token.parse().ok()
    }
}

/// The stage a dependency is declared for.
#[derive(
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Debug,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    /// Needed to build the requesting package.
    #[strum(serialize = "build")]
    Build,

    /// Needed at run time.
    #[strum(serialize = "run")]
    Run,
}

/// A package name in the target ecosystem's naming convention.
///
/// Source names are simplified (lowercased, runs of `-`/`_`/`.` collapsed
/// to a single dash) and prefixed with `py-`, matching how the target
/// ecosystem names converted packages. The pseudo-dependency `python`
/// passes through untouched.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct PackageName(String);

impl PackageName {
    /// Convert a source-registry package name to the target naming
    /// convention.
    pub fn from_pypi(name: &str) -> Self {
        let simplified = regex!(r"[-_.]+")
            .replace_all(&name.to_ascii_lowercase(), "-")
            .into_owned();

        // A name already carrying the prefix keeps it, except for the
        // handful of upstream packages whose registered target name really
        // is doubly prefixed.
        let doubly_prefixed = ["py-cpuinfo", "py-tes", "py-spy"];
        if simplified != "python"
            && (!simplified.starts_with("py-") || doubly_prefixed.contains(&simplified.as_str()))
        {
            Self(format!("py-{simplified}"))
        } else {
            Self(simplified)
        }
    }

    /// View the name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Debug for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}
