//! Version range constraints for addon requirements
//!
//! A requirement edge in the catalog carries an optional range constraint on
//! the dependency's version. Ranges are comma-separated comparator lists
//! where every comparator must hold:
//!
//! - `>=1.0.0`
//! - `>=1.0,<2.0`
//! - `==1.2.3` (a bare version means the same)
//! - `!=1.1.0`
//!
//! Version components may be `major.minor` (patch defaults to 0) or full
//! `major.minor.patch`.

use std::fmt;

use crate::error::{Error, Result};

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `==`
    Eq,
    /// `!=`
    Ne,
}

/// A single comparator: an operator paired with a version.
#[derive(Debug, Clone)]
struct Comparator {
    op: CompareOp,
    version: semver::Version,
}

impl Comparator {
    fn matches(&self, candidate: &semver::Version) -> bool {
        match self.op {
            CompareOp::Gte => candidate >= &self.version,
            CompareOp::Gt => candidate > &self.version,
            CompareOp::Lte => candidate <= &self.version,
            CompareOp::Lt => candidate < &self.version,
            CompareOp::Eq => candidate == &self.version,
            CompareOp::Ne => candidate != &self.version,
        }
    }
}

/// A parsed range constraint checked against concrete addon versions.
///
/// Compound constraints (`>=1.0,<2.0`) require every comparator to match.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    comparators: Vec<Comparator>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a range constraint string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConstraintParse`] on an empty constraint or an
    /// unparseable comparator.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.to_string();
        let parts: Vec<&str> = constraint.split(',').map(|s| s.trim()).collect();
        let mut comparators = Vec::with_capacity(parts.len());

        for part in parts {
            if part.is_empty() {
                continue;
            }
            comparators.push(parse_comparator(part)?);
        }

        if comparators.is_empty() {
            return Err(Error::ConstraintParse {
                constraint: raw,
                reason: "empty constraint".to_string(),
            });
        }

        Ok(Self { comparators, raw })
    }

    /// Check whether a version satisfies every comparator in this constraint.
    pub fn satisfies(&self, version: &semver::Version) -> bool {
        self.comparators.iter().all(|c| c.matches(version))
    }

    /// The original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a single comparator like `>=1.0` or `<2.0.0`.
fn parse_comparator(s: &str) -> Result<Comparator> {
    let (op, version_str) = if let Some(rest) = s.strip_prefix(">=") {
        (CompareOp::Gte, rest)
    } else if let Some(rest) = s.strip_prefix("<=") {
        (CompareOp::Lte, rest)
    } else if let Some(rest) = s.strip_prefix("!=") {
        (CompareOp::Ne, rest)
    } else if let Some(rest) = s.strip_prefix("==") {
        (CompareOp::Eq, rest)
    } else if let Some(rest) = s.strip_prefix('>') {
        (CompareOp::Gt, rest)
    } else if let Some(rest) = s.strip_prefix('<') {
        (CompareOp::Lt, rest)
    } else {
        // Bare version implies ==
        (CompareOp::Eq, s)
    };

    let version_str = version_str.trim();
    let version = parse_version(version_str).map_err(|reason| Error::ConstraintParse {
        constraint: s.to_string(),
        reason,
    })?;

    Ok(Comparator { op, version })
}

/// Parse a version string, appending `.0` for a missing patch component.
///
/// - `"1.0"` -> `1.0.0`
/// - `"1.0.3"` -> `1.0.3`
pub fn parse_version(s: &str) -> std::result::Result<semver::Version, String> {
    let s = s.trim();

    if let Ok(v) = semver::Version::parse(s) {
        return Ok(v);
    }

    let with_patch = format!("{s}.0");
    semver::Version::parse(&with_patch).map_err(|e| format!("invalid version '{s}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> semver::Version {
        parse_version(s).unwrap()
    }

    #[test]
    fn parse_gte() {
        let c = VersionConstraint::parse(">=1.0.0").unwrap();
        assert_eq!(c.comparators.len(), 1);
        assert_eq!(c.as_str(), ">=1.0.0");
    }

    #[test]
    fn parse_compound() {
        let c = VersionConstraint::parse(">=1.0,<2.0").unwrap();
        assert_eq!(c.comparators.len(), 2);
    }

    #[test]
    fn parse_bare_version_means_eq() {
        let c = VersionConstraint::parse("1.2.3").unwrap();
        assert!(c.satisfies(&v("1.2.3")));
        assert!(!c.satisfies(&v("1.2.4")));
    }

    #[test]
    fn parse_empty_rejected() {
        assert!(VersionConstraint::parse("").is_err());
    }

    #[test]
    fn parse_garbage_rejected() {
        assert!(VersionConstraint::parse(">=abc").is_err());
    }

    #[test]
    fn satisfies_gte() {
        let c = VersionConstraint::parse(">=1.2").unwrap();
        assert!(c.satisfies(&v("1.2.0")));
        assert!(c.satisfies(&v("2.0.0")));
        assert!(!c.satisfies(&v("1.1.9")));
    }

    #[test]
    fn satisfies_compound_window() {
        let c = VersionConstraint::parse(">=1.0,<2.0").unwrap();
        assert!(c.satisfies(&v("1.0.0")));
        assert!(c.satisfies(&v("1.9.9")));
        assert!(!c.satisfies(&v("0.9.0")));
        assert!(!c.satisfies(&v("2.0.0")));
    }

    #[test]
    fn satisfies_ne() {
        let c = VersionConstraint::parse("!=1.1.0").unwrap();
        assert!(c.satisfies(&v("1.2.0")));
        assert!(!c.satisfies(&v("1.1.0")));
    }

    #[test]
    fn two_part_versions_get_zero_patch() {
        assert_eq!(v("1.2"), semver::Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), semver::Version::new(1, 2, 3));
    }

    #[test]
    fn display_preserves_raw() {
        let c = VersionConstraint::parse(">=1.0, <2.0").unwrap();
        assert_eq!(format!("{c}"), ">=1.0, <2.0");
    }

    #[test]
    fn disjoint_window_never_satisfied() {
        // The conflicting shape VersionConflict reporting relies on
        let c = VersionConstraint::parse(">=2.0,<2.0").unwrap();
        assert!(!c.satisfies(&v("1.0.0")));
        assert!(!c.satisfies(&v("2.0.0")));
        assert!(!c.satisfies(&v("3.0.0")));
    }
}
