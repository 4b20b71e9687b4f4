//! Remote addon repository access
//!
//! This crate covers the repository side of a convergence run: the supported
//! platform releases, the catalog document and its descriptors, the
//! per-release repository index, and the HTTP fetch seams used by the
//! convergence engine.

pub mod catalog;
pub mod client;
pub mod constraint;
pub mod descriptor;
pub mod error;
pub mod release;

pub use catalog::RepositoryIndex;
pub use client::{
    CATALOG_DIGEST_FILENAME, CATALOG_FILENAME, DEFAULT_REPOSITORY_URL, HttpRepository,
    IndexSource, PackageFetcher,
};
pub use constraint::VersionConstraint;
pub use descriptor::{AddonDescriptor, Requirement};
pub use error::{Error, Result};
pub use release::Release;
