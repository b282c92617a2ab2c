use thiserror::Error;

/// Records all errors reported by this library.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Errors encountered while parsing source-scheme expressions.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Errors encountered while converting a requirement.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Errors encountered while looking up known versions.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Errors encountered when parsing a source-scheme expression from a string.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ParseError {
    /// The input was not a valid version.
    #[error("parse version {input:?}: {message}")]
    Version {
        /// The input originally provided to the parser.
        input: String,

        /// The error message.
        message: String,
    },

    /// The input was not a valid version specifier set.
    #[error("parse specifier {input:?}: {message}")]
    Specifier {
        /// The input originally provided to the parser.
        input: String,

        /// The error message.
        message: String,
    },

    /// The input was not a valid marker expression.
    #[error("parse marker {input:?}: {message}")]
    Marker {
        /// The input originally provided to the parser.
        input: String,

        /// The error message.
        message: String,
    },

    /// The input was not a valid requirement.
    #[error("parse requirement {input:?}: {message}")]
    Requirement {
        /// The input originally provided to the parser.
        input: String,

        /// The error message.
        message: String,
    },
}

/// A version carries a combination of qualifiers the target scheme cannot
/// order faithfully (a pre-release together with post/dev/local suffixes).
///
/// Such versions are excluded from interval computations; a release whose
/// own version is unsupported is skipped with a warning rather than
/// aborting the conversion.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[error("version {version} has no faithful representation in the target scheme")]
pub struct UnsupportedVersion {
    /// The offending version, in source-scheme notation.
    pub version: String,
}

/// A known-version lookup against the registry collaborator failed.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ProviderError {
    /// The package is not known to the registry.
    #[error("no known versions for package '{name}'")]
    UnknownPackage {
        /// The package that was looked up.
        name: String,
    },

    /// The lookup itself failed.
    #[error("look up versions for package '{name}': {message}")]
    Lookup {
        /// The package that was looked up.
        name: String,

        /// The error message reported by the collaborator.
        message: String,
    },
}

/// A single requirement could not be translated.
///
/// Recorded per source release and surfaced to the user; never aborts the
/// conversion of the remaining requirements or releases.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[non_exhaustive]
pub enum ConversionError {
    /// The requirement's marker expression cannot be expressed in the
    /// target constraint language.
    #[error("unable to translate marker for dependency '{requirement}'{}", from_extra_suffix(.from_extra))]
    UnevaluableMarker {
        /// The requirement being converted.
        requirement: String,

        /// The optional feature of the requesting package this requirement
        /// was declared under, if any.
        from_extra: Option<String>,
    },

    /// The requirement's version specifier matches no known release of the
    /// dependency. This indicates a real upstream conflict worth surfacing,
    /// as opposed to a requirement correctly excluded by its marker.
    #[error("no known version of '{requirement}' satisfies the specifier{}", from_extra_suffix(.from_extra))]
    NoMatchingVersions {
        /// The requirement being converted.
        requirement: String,

        /// The optional feature of the requesting package this requirement
        /// was declared under, if any.
        from_extra: Option<String>,
    },

    /// The dependency's known versions could not be looked up.
    #[error("unable to convert dependency '{requirement}': {source}")]
    Provider {
        /// The requirement being converted.
        requirement: String,

        /// The lookup failure.
        #[source]
        source: ProviderError,
    },
}

fn from_extra_suffix(from_extra: &Option<String>) -> String {
    match from_extra {
        Some(extra) => format!(" from extra '{extra}'"),
        None => String::new(),
    }
}

/// Two merged requirements on the same dependency apply under overlapping
/// conditions yet no version can satisfy both constraints.
///
/// This is a diagnostic for manual review; the merged output is still
/// produced.
#[derive(Error, Clone, PartialEq, Eq, Debug)]
#[error("incompatible requirements: {first} conflicts with {second}")]
pub struct ConflictError {
    /// The first of the conflicting dependencies, rendered.
    pub first: String,

    /// The second of the conflicting dependencies, rendered.
    pub second: String,
}

/// Constraining a condition produced a contradiction (for example requiring
/// both `+extra` and `~extra`, or two different platforms).
#[derive(Error, Clone, Copy, PartialEq, Eq, Debug)]
#[error("constraints are mutually unsatisfiable")]
pub struct Unsatisfiable;
