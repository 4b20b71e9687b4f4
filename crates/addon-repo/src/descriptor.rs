//! Addon descriptors from the repository catalog
//!
//! A descriptor is the catalog's record of one addon version: identity,
//! version, requirement edges, and where to fetch the package archive.
//! Catalog entries are parsed tolerantly — unknown extra fields are ignored
//! so newer catalogs remain readable — but a missing `id`, `version`, or
//! package path is a hard [`Error::MalformedDescriptor`].

use serde::Deserialize;

use crate::constraint::{VersionConstraint, parse_version};
use crate::error::{Error, Result};

/// A requirement edge: this addon needs `addon`, optionally within `range`.
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Required addon id.
    pub addon: String,
    /// Version range the dependency must satisfy; `None` accepts any version.
    pub range: Option<VersionConstraint>,
}

/// One addon version as described by the repository catalog.
///
/// Immutable once parsed. Identity is `id`; the catalog may list several
/// versions per id, and resolution selects at most one of them.
#[derive(Debug, Clone)]
pub struct AddonDescriptor {
    /// Stable addon id (e.g. `metadata.tvdb.com`).
    pub id: String,
    /// Addon version.
    pub version: semver::Version,
    /// Requirement edges in catalog order.
    pub requires: Vec<Requirement>,
    /// Absolute URL of the package archive.
    pub package_url: String,
    /// Expected archive digest (`sha256:<hex>`), when the catalog carries one.
    pub checksum: Option<String>,
}

/// Raw catalog entry shape. Every field is optional here; validation into
/// [`AddonDescriptor`] decides what is actually required.
#[derive(Debug, Deserialize)]
pub(crate) struct RawDescriptor {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    requires: Vec<RawRequirement>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequirement {
    #[serde(default)]
    addon: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

impl RawDescriptor {
    /// Validate a raw entry into a descriptor, resolving relative package
    /// paths against `base_url`.
    pub(crate) fn validate(self, base_url: &str) -> Result<AddonDescriptor> {
        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => {
                return Err(Error::MalformedDescriptor {
                    id: "<unknown>".to_string(),
                    reason: "missing addon id".to_string(),
                });
            }
        };

        let version_str = self.version.ok_or_else(|| Error::MalformedDescriptor {
            id: id.clone(),
            reason: "missing version".to_string(),
        })?;
        let version = parse_version(&version_str).map_err(|reason| Error::MalformedDescriptor {
            id: id.clone(),
            reason,
        })?;

        let path = match self.path {
            Some(path) if !path.trim().is_empty() => path,
            _ => {
                return Err(Error::MalformedDescriptor {
                    id: id.clone(),
                    reason: "missing package path".to_string(),
                });
            }
        };
        let package_url = resolve_package_url(base_url, &path);

        let mut requires = Vec::with_capacity(self.requires.len());
        for raw in self.requires {
            let addon = match raw.addon {
                Some(addon) if !addon.trim().is_empty() => addon,
                _ => {
                    return Err(Error::MalformedDescriptor {
                        id: id.clone(),
                        reason: "requirement without addon id".to_string(),
                    });
                }
            };
            let range = match raw.version {
                Some(range) => Some(VersionConstraint::parse(&range).map_err(|e| {
                    Error::MalformedDescriptor {
                        id: id.clone(),
                        reason: format!("requirement on '{addon}': {e}"),
                    }
                })?),
                None => None,
            };
            requires.push(Requirement { addon, range });
        }

        Ok(AddonDescriptor {
            id,
            version,
            requires,
            package_url,
            checksum: self.checksum,
        })
    }
}

/// Join a catalog package path onto the release base URL. Absolute URLs in
/// the catalog are taken as-is.
fn resolve_package_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://mirror.example/addons/leia";

    fn raw(json: &str) -> RawDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn validates_complete_entry() {
        let desc = raw(r#"{
            "id": "metadata.tvdb.com",
            "version": "3.2.1",
            "requires": [{"addon": "scraper.common", "version": ">=1.0"}],
            "path": "metadata.tvdb.com/metadata.tvdb.com-3.2.1.zip",
            "checksum": "sha256:00ff"
        }"#)
        .validate(BASE)
        .unwrap();

        assert_eq!(desc.id, "metadata.tvdb.com");
        assert_eq!(desc.version, semver::Version::new(3, 2, 1));
        assert_eq!(desc.requires.len(), 1);
        assert_eq!(desc.requires[0].addon, "scraper.common");
        assert_eq!(
            desc.package_url,
            "https://mirror.example/addons/leia/metadata.tvdb.com/metadata.tvdb.com-3.2.1.zip"
        );
        assert_eq!(desc.checksum.as_deref(), Some("sha256:00ff"));
    }

    #[test]
    fn tolerates_unknown_extra_fields() {
        let desc = raw(r#"{
            "id": "plugin.demo",
            "version": "1.0.0",
            "path": "plugin.demo/plugin.demo-1.0.0.zip",
            "provider": "someone",
            "news": "brand new",
            "metadata": {"nested": true}
        }"#)
        .validate(BASE)
        .unwrap();

        assert_eq!(desc.id, "plugin.demo");
        assert!(desc.requires.is_empty());
    }

    #[test]
    fn missing_id_is_malformed() {
        let err = raw(r#"{"version": "1.0.0", "path": "x.zip"}"#)
            .validate(BASE)
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor { .. }), "got: {err:?}");
    }

    #[test]
    fn missing_version_is_malformed() {
        let err = raw(r#"{"id": "plugin.demo", "path": "x.zip"}"#)
            .validate(BASE)
            .unwrap_err();
        assert!(
            matches!(err, Error::MalformedDescriptor { ref id, .. } if id == "plugin.demo"),
            "got: {err:?}"
        );
    }

    #[test]
    fn missing_path_is_malformed() {
        let err = raw(r#"{"id": "plugin.demo", "version": "1.0.0"}"#)
            .validate(BASE)
            .unwrap_err();
        assert!(
            matches!(err, Error::MalformedDescriptor { ref id, .. } if id == "plugin.demo"),
            "got: {err:?}"
        );
    }

    #[test]
    fn two_part_version_accepted() {
        let desc = raw(r#"{"id": "plugin.demo", "version": "1.2", "path": "x.zip"}"#)
            .validate(BASE)
            .unwrap();
        assert_eq!(desc.version, semver::Version::new(1, 2, 0));
    }

    #[test]
    fn absolute_package_url_kept() {
        let desc = raw(r#"{
            "id": "plugin.demo",
            "version": "1.0.0",
            "path": "https://cdn.example/plugin.demo-1.0.0.zip"
        }"#)
        .validate(BASE)
        .unwrap();
        assert_eq!(desc.package_url, "https://cdn.example/plugin.demo-1.0.0.zip");
    }

    #[test]
    fn invalid_requirement_range_is_malformed() {
        let err = raw(r#"{
            "id": "plugin.demo",
            "version": "1.0.0",
            "path": "x.zip",
            "requires": [{"addon": "scraper.common", "version": "not-a-range"}]
        }"#)
        .validate(BASE)
        .unwrap_err();
        assert!(matches!(err, Error::MalformedDescriptor { .. }), "got: {err:?}");
    }

    #[test]
    fn missing_checksum_is_allowed() {
        let desc = raw(r#"{"id": "plugin.demo", "version": "1.0.0", "path": "x.zip"}"#)
            .validate(BASE)
            .unwrap();
        assert!(desc.checksum.is_none());
    }
}
