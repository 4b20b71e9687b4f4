//! Installed state: the record file and the reader
//!
//! The state record is the persisted enabled/disabled truth for an install
//! root, a versioned TOML document saved atomically. The reader joins it
//! with a scan of the storage directories to produce the current installed
//! graph. State is read fresh at the start of every run; nothing is cached
//! across invocations.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::InstallLayout;

/// One installed addon as observed on disk plus the state record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledAddon {
    /// Stable addon id (the storage subdirectory name).
    pub id: String,
    /// Installed version.
    pub version: semver::Version,
    /// Whether the addon is enabled in the state record.
    pub enabled: bool,
    /// Whether the addon was installed as a dependency of another addon.
    pub installed_as_dependency: bool,
}

/// One row of the persisted state record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Version that was installed.
    pub version: String,
    /// Enabled flag; the only field enable/disable actions touch.
    pub enabled: bool,
    /// Set for addons pulled in as dependencies rather than requested.
    #[serde(default)]
    pub installed_as_dependency: bool,
    /// When the entry was first recorded.
    pub installed_at: DateTime<Utc>,
}

/// The persisted enabled/disabled record for an install root.
///
/// Persisted as TOML and written atomically; a missing record file denotes
/// "nothing recorded", not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateRecord {
    /// Record format version for forward compatibility
    version: String,
    /// Recorded addons keyed by id
    #[serde(default)]
    addons: BTreeMap<String, RecordEntry>,
}

impl StateRecord {
    /// Create a new empty record.
    pub fn new() -> Self {
        Self {
            version: "1".to_string(),
            addons: BTreeMap::new(),
        }
    }

    /// Load the record at `path`, or an empty record if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateUnreadable`] if the file exists but cannot be
    /// read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => {
                return Err(Error::StateUnreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        toml::from_str(&content).map_err(|e| Error::StateUnreadable {
            path: path.to_path_buf(),
            reason: format!("corrupt state record: {e}"),
        })
    }

    /// Save the record to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        addon_fs::io::write_text(path, &content)?;
        Ok(())
    }

    /// Recorded entry for `id`.
    pub fn get(&self, id: &str) -> Option<&RecordEntry> {
        self.addons.get(id)
    }

    /// All recorded ids and entries.
    pub fn entries(&self) -> &BTreeMap<String, RecordEntry> {
        &self.addons
    }

    /// Record a fresh install. New entries are always disabled; enabling is
    /// a separate action.
    pub fn record_install(
        &mut self,
        id: &str,
        version: &semver::Version,
        installed_as_dependency: bool,
    ) {
        self.addons.insert(
            id.to_string(),
            RecordEntry {
                version: version.to_string(),
                enabled: false,
                installed_as_dependency,
                installed_at: Utc::now(),
            },
        );
    }

    /// Flip the enabled flag for `id`, inserting a row if the addon is on
    /// disk but was never recorded. Returns whether anything changed.
    pub fn set_enabled(&mut self, id: &str, enabled: bool, version: &semver::Version) -> bool {
        match self.addons.get_mut(id) {
            Some(entry) => {
                if entry.enabled == enabled {
                    false
                } else {
                    entry.enabled = enabled;
                    true
                }
            }
            None => {
                self.addons.insert(
                    id.to_string(),
                    RecordEntry {
                        version: version.to_string(),
                        enabled,
                        installed_as_dependency: false,
                        installed_at: Utc::now(),
                    },
                );
                true
            }
        }
    }

    /// Remove the row for `id`, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<RecordEntry> {
        self.addons.remove(id)
    }
}

/// Reads the current installed graph from an install root.
#[derive(Debug)]
pub struct InstalledStateReader {
    layout: InstallLayout,
}

impl InstalledStateReader {
    pub fn new(layout: InstallLayout) -> Self {
        Self { layout }
    }

    /// Scan the storage root and join it with the state record.
    ///
    /// An addon present on disk but absent from the record is treated as
    /// enabled (the platform default). A missing root or record denotes
    /// "nothing installed".
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateUnreadable`] on unrecoverable I/O or a corrupt
    /// record.
    pub fn read(&self) -> Result<BTreeMap<String, InstalledAddon>> {
        let root = self.layout.root();
        if !root.exists() {
            return Ok(BTreeMap::new());
        }

        let record = StateRecord::load(&self.layout.state_record())?;

        let mut installed = BTreeMap::new();
        let entries = fs::read_dir(root).map_err(|e| Error::StateUnreadable {
            path: root.to_path_buf(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| Error::StateUnreadable {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let id = name.to_string_lossy().to_string();
            if InstallLayout::is_reserved_name(&id) {
                continue;
            }

            let addon = match record.get(&id) {
                Some(row) => {
                    let version = addon_repo::constraint::parse_version(&row.version)
                        .map_err(|reason| Error::StateUnreadable {
                            path: self.layout.state_record(),
                            reason: format!("entry '{id}': {reason}"),
                        })?;
                    InstalledAddon {
                        id: id.clone(),
                        version,
                        enabled: row.enabled,
                        installed_as_dependency: row.installed_as_dependency,
                    }
                }
                None => {
                    tracing::warn!(addon = %id, "on disk but not in state record, assuming enabled");
                    InstalledAddon {
                        id: id.clone(),
                        version: probe_manifest_version(&entry.path())
                            .unwrap_or_else(|| semver::Version::new(0, 0, 0)),
                        enabled: true,
                        installed_as_dependency: false,
                    }
                }
            };
            installed.insert(id, addon);
        }

        for id in record.entries().keys() {
            if !installed.contains_key(id) {
                tracing::warn!(addon = %id, "state record row has no directory, ignoring");
            }
        }

        Ok(installed)
    }
}

/// Best-effort version probe from an addon's own `addon.json` manifest, for
/// addons that reached the disk without going through this engine.
fn probe_manifest_version(dir: &Path) -> Option<semver::Version> {
    let raw = fs::read_to_string(dir.join("addon.json")).ok()?;
    let value: serde_json::Value = serde_json::from_str(&raw).ok()?;
    let version = value.get("version")?.as_str()?;
    addon_repo::constraint::parse_version(version).ok()
}
