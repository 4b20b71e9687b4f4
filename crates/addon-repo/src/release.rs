//! Supported platform releases
//!
//! The compatibility tag selects which per-release catalog is fetched. Only
//! releases that share the addon storage and state-record layout implemented
//! here are accepted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Platform release codenames this engine can converge against.
pub const SUPPORTED_RELEASES: &[&str] = &["krypton", "leia", "matrix"];

/// A validated platform-release compatibility tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Release(String);

impl Release {
    /// Parse a release codename, rejecting unsupported releases.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedRelease`] if the codename is not in
    /// [`SUPPORTED_RELEASES`].
    pub fn parse(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        if SUPPORTED_RELEASES.contains(&normalized.as_str()) {
            Ok(Self(normalized))
        } else {
            Err(Error::UnsupportedRelease {
                release: name.to_string(),
                supported: SUPPORTED_RELEASES.join(", "),
            })
        }
    }

    /// The release codename.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Release {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Release {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Release> for String {
    fn from(release: Release) -> Self {
        release.0
    }
}
