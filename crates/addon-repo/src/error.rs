//! Error types for addon-repo

/// Result type for addon-repo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur on the repository side of a run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The catalog or its digest document could not be fetched.
    #[error("repository index unavailable at {url}: {reason}")]
    IndexUnavailable { url: String, reason: String },

    /// The fetched catalog failed digest verification.
    #[error("repository index at {url} failed digest verification against {expected}")]
    IndexCorrupt { url: String, expected: String },

    /// A descriptor is missing a required field or carries an invalid value.
    #[error("malformed descriptor '{id}': {reason}")]
    MalformedDescriptor { id: String, reason: String },

    /// The requested compatibility tag is not a supported platform release.
    #[error("unsupported platform release '{release}' (supported: {supported})")]
    UnsupportedRelease { release: String, supported: String },

    /// A package archive could not be fetched from its URL.
    #[error("package for '{id}' unavailable at {url}: {reason}")]
    PackageUnavailable {
        id: String,
        url: String,
        reason: String,
    },

    /// A version range constraint could not be parsed.
    #[error("invalid version constraint '{constraint}': {reason}")]
    ConstraintParse { constraint: String, reason: String },
}
