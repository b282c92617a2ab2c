//! # Known-Version Providers and Memoization
//!
//! The core never talks to a registry itself; it consumes an ordered list
//! of known versions per dependency through the [`VersionProvider`] seam,
//! which the surrounding I/O layer implements. [`StaticProvider`] backs
//! tests and fixtures.
//!
//! [`VersionOracle`] wraps a provider with the per-conversion caches:
//! filtered and sorted universes per name, and condensation results per
//! `(name, specifier)` pair. The oracle is an explicit handle so every
//! conversion (and every test) gets an isolated cache; drop it to discard
//! all memoized answers. It is deliberately single-threaded (`RefCell`
//! inside, so not `Sync`) — parallel conversions partition one oracle per
//! worker.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::ProviderError;
use crate::pip;
use crate::ranges::{VersionList, condense};
use crate::specifier::SpecifierSet;

/// The python release lines the evaluator reasons over, newest patch per
/// minor. Only released lines matter; the trailing `4.0.0` entry keeps
/// upper bounds honest.
pub const KNOWN_PYTHON_VERSIONS: [(u64, u64, u64); 9] = [
    (3, 6, 15),
    (3, 7, 17),
    (3, 8, 18),
    (3, 9, 18),
    (3, 10, 13),
    (3, 11, 7),
    (3, 12, 1),
    (3, 13, 0),
    (4, 0, 0),
];

/// The known-version universe of the `python` pseudo-dependency.
pub fn known_python_versions() -> Vec<pip::Version> {
    KNOWN_PYTHON_VERSIONS
        .iter()
        .map(|&(major, minor, patch)| {
            pip::Version::builder()
                .release(vec![major, minor, patch])
                .build()
        })
        .collect()
}

/// Supplies the complete list of known release versions of a named
/// dependency, as reported by the registry.
///
/// Implemented by the surrounding I/O layer; the returned list need not be
/// sorted or filtered, the [`VersionOracle`] normalizes it.
pub trait VersionProvider {
    /// All parseable release identifiers of `name`.
    fn versions(&self, name: &str) -> Result<Vec<pip::Version>, ProviderError>;
}

/// An in-memory provider over a fixed table of versions.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    versions: HashMap<String, Vec<pip::Version>>,
}

impl StaticProvider {
    /// An empty provider knowing no packages.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the known versions of a package.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        versions: impl IntoIterator<Item = pip::Version>,
    ) {
        self.versions
            .insert(name.into(), versions.into_iter().collect());
    }
}

impl VersionProvider for StaticProvider {
    fn versions(&self, name: &str) -> Result<Vec<pip::Version>, ProviderError> {
        self.versions
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownPackage {
                name: name.to_string(),
            })
    }
}

/// A memoizing view over a [`VersionProvider`], scoped to one conversion
/// run.
pub struct VersionOracle<'a> {
    provider: &'a dyn VersionProvider,
    universes: RefCell<HashMap<String, Rc<Vec<pip::Version>>>>,
    condensed: RefCell<HashMap<(String, String), VersionList>>,
}

impl<'a> VersionOracle<'a> {
    /// A fresh oracle with empty caches.
    pub fn new(provider: &'a dyn VersionProvider) -> Self {
        Self {
            provider,
            universes: RefCell::new(HashMap::new()),
            condensed: RefCell::new(HashMap::new()),
        }
    }

    /// The known-version universe of `name`: type-filtered, ascending,
    /// deduplicated. Cached for the lifetime of the oracle.
    ///
    /// The filtering drops versions the target scheme cannot represent,
    /// which makes every answer derived from the universe lossy with
    /// respect to those versions. The `python` pseudo-dependency resolves
    /// to the static release table instead of the provider.
    pub fn universe(&self, name: &str) -> Result<Rc<Vec<pip::Version>>, ProviderError> {
        if let Some(cached) = self.universes.borrow().get(name) {
            return Ok(Rc::clone(cached));
        }

        let mut versions = if name == "python" {
            known_python_versions()
        } else {
            self.provider.versions(name)?
        };
        versions.retain(pip::Version::is_supported);
        versions.sort();
        versions.dedup_by(|a, b| a.cmp(&b).is_eq());

        let universe = Rc::new(versions);
        self.universes
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&universe));
        Ok(universe)
    }

    /// The condensed version list selecting exactly the universe versions
    /// of `name` that satisfy `specifier`. Cached per `(name, specifier)`.
    ///
    /// An empty result means no known version satisfies the specifier; the
    /// caller decides whether that is an error.
    pub fn matching(
        &self,
        name: &str,
        specifier: &SpecifierSet,
    ) -> Result<VersionList, ProviderError> {
        let key = (name.to_string(), specifier.to_string());
        if let Some(cached) = self.condensed.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let universe = self.universe(name)?;
        let matching: Vec<pip::Version> = universe
            .iter()
            .filter(|v| specifier.all_match(v))
            .cloned()
            .collect();
        let condensed = condense(&matching, &universe);

        self.condensed.borrow_mut().insert(key, condensed.clone());
        Ok(condensed)
    }
}
