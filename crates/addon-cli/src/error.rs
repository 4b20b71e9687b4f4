//! Error types for the CLI

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the terminal
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid command-line input
    #[error("{0}")]
    Usage(String),

    /// Engine error from addon-core
    #[error(transparent)]
    Core(#[from] addon_core::Error),

    /// Repository error from addon-repo
    #[error(transparent)]
    Repo(#[from] addon_repo::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
