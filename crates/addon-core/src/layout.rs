//! Install-root layout
//!
//! The install root is the single piece of shared mutable truth in the
//! system. It is modeled as an explicit injected value: every component that
//! reads or writes it receives an [`InstallLayout`] rather than computing
//! paths ad hoc.
//!
//! ```text
//! <root>/
//!   <addon id>/            one subdirectory per installed addon
//!   packages/              cache of verified downloaded archives
//!   .staging/              extraction scratch space, never scanned
//!   addons.state.toml      persisted enabled/disabled record
//!   .addonmgr.lock         per-run advisory lock
//! ```

use std::path::{Path, PathBuf};

/// Persisted enabled/disabled record filename.
pub const STATE_RECORD_FILENAME: &str = "addons.state.toml";

/// Advisory run-lock filename.
pub const RUN_LOCK_FILENAME: &str = ".addonmgr.lock";

/// Archive cache directory name.
pub const PACKAGES_DIRNAME: &str = "packages";

/// Extraction scratch directory name.
pub const STAGING_DIRNAME: &str = ".staging";

/// Data directory under a service account's home holding the default root.
pub const DATA_DIRNAME: &str = ".mediacenter";

/// Paths of one addon install root.
#[derive(Debug, Clone)]
pub struct InstallLayout {
    root: PathBuf,
}

impl InstallLayout {
    /// Layout rooted at an explicit directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default layout for a service account's home directory:
    /// `<home>/.mediacenter/addons`.
    pub fn for_account_home(home: &Path) -> Self {
        Self::new(home.join(DATA_DIRNAME).join("addons"))
    }

    /// Default layout for the invoking user, when no service account is
    /// configured. `None` when the home directory cannot be determined.
    pub fn for_current_user() -> Option<Self> {
        dirs::home_dir().map(|home| Self::for_account_home(&home))
    }

    /// The addon storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage subdirectory for one addon id.
    pub fn addon_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// The persisted enabled/disabled record.
    pub fn state_record(&self) -> PathBuf {
        self.root.join(STATE_RECORD_FILENAME)
    }

    /// The per-run advisory lock file.
    pub fn lock_file(&self) -> PathBuf {
        self.root.join(RUN_LOCK_FILENAME)
    }

    /// Cache directory for verified downloaded archives.
    pub fn packages_dir(&self) -> PathBuf {
        self.root.join(PACKAGES_DIRNAME)
    }

    /// Extraction scratch directory for one addon id.
    pub fn staging_dir(&self, id: &str) -> PathBuf {
        self.root.join(STAGING_DIRNAME).join(id)
    }

    /// Whether a root directory entry name is reserved (never an addon id).
    pub fn is_reserved_name(name: &str) -> bool {
        name == PACKAGES_DIRNAME || name.starts_with('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn paths_live_under_root() {
        let layout = InstallLayout::new("/data/addons");

        assert_eq!(layout.addon_dir("plugin.demo"), PathBuf::from("/data/addons/plugin.demo"));
        assert_eq!(
            layout.state_record(),
            PathBuf::from("/data/addons/addons.state.toml")
        );
        assert_eq!(layout.lock_file(), PathBuf::from("/data/addons/.addonmgr.lock"));
        assert_eq!(layout.packages_dir(), PathBuf::from("/data/addons/packages"));
        assert_eq!(
            layout.staging_dir("plugin.demo"),
            PathBuf::from("/data/addons/.staging/plugin.demo")
        );
    }

    #[test]
    fn default_layout_under_account_home() {
        let layout = InstallLayout::for_account_home(Path::new("/home/media"));
        assert_eq!(layout.root(), Path::new("/home/media/.mediacenter/addons"));
    }

    #[test]
    fn reserved_names_are_not_addon_ids() {
        assert!(InstallLayout::is_reserved_name("packages"));
        assert!(InstallLayout::is_reserved_name(".staging"));
        assert!(InstallLayout::is_reserved_name(".addonmgr.lock"));
        assert!(!InstallLayout::is_reserved_name("plugin.demo"));
    }
}
