//! Error types for addon-core

use std::path::PathBuf;

/// Result type for addon-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a convergence run
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Installed state could not be read (unrecoverable I/O or corrupt record).
    #[error("installed state unreadable at {path}: {reason}")]
    StateUnreadable { path: PathBuf, reason: String },

    /// The requested addon (or a dependency) is absent from the index.
    #[error("unknown addon '{id}' in repository index")]
    UnknownAddon { id: String },

    /// No candidate version satisfies every accumulated range constraint.
    #[error("no version of '{id}' satisfies: {}", constraints.join("; "))]
    VersionConflict {
        id: String,
        constraints: Vec<String>,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    /// The package archive failed checksum verification after all retries.
    #[error("package for '{id}' at {url} failed checksum verification after {attempts} attempts")]
    PackageCorrupt {
        id: String,
        url: String,
        attempts: u32,
    },

    /// An addon subtree or record entry could not be fully removed.
    #[error("failed to remove '{id}' at {path}: {source}")]
    RemovalFailed {
        id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another convergence run holds the install-root lock.
    #[error("another convergence run is active on {root}")]
    ConcurrentRunDetected { root: PathBuf },

    /// The configured service account does not exist on this system.
    #[error("unknown service account '{name}'")]
    UnknownAccount { name: String },

    // Transparent wrappers for underlying crate errors
    /// Repository error from addon-repo
    #[error(transparent)]
    Repo(#[from] addon_repo::Error),

    /// Filesystem error from addon-fs
    #[error(transparent)]
    Fs(#[from] addon_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML serialization error for the state record
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
