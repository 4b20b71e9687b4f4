//! Service-account ownership collaborator
//!
//! The engine's postcondition is that every path it writes ends up owned by
//! the configured service account. How that happens is delegated to an
//! [`Ownership`] implementation: the real one chowns recursively, tests
//! record or ignore the calls.

use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use crate::error::{Error, Result};

/// Applies the configured ownership to written paths.
pub trait Ownership: Send + Sync {
    /// Apply ownership to `path`, recursively when it is a directory.
    fn apply(&self, path: &Path) -> io::Result<()>;
}

/// Leaves ownership as the invoking user. Used when no service account is
/// configured and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepCurrentOwner;

impl Ownership for KeepCurrentOwner {
    fn apply(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

/// A resolved system account the platform runs as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAccount {
    /// Account name.
    pub name: String,
    /// Numeric user id.
    pub uid: u32,
    /// Numeric primary group id.
    pub gid: u32,
    /// Home directory, used for the default install root.
    pub home: PathBuf,
}

#[cfg(unix)]
impl ServiceAccount {
    /// Resolve an account by name from the system user database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownAccount`] if no such account exists.
    pub fn lookup(name: &str) -> Result<Self> {
        use std::ffi::{CStr, CString};

        let c_name = CString::new(name).map_err(|_| Error::UnknownAccount {
            name: name.to_string(),
        })?;

        // SAFETY: getpwnam returns a pointer into static storage (or null);
        // every field is copied out before any further libc call.
        let pw = unsafe { libc::getpwnam(c_name.as_ptr()) };
        if pw.is_null() {
            return Err(Error::UnknownAccount {
                name: name.to_string(),
            });
        }
        let (uid, gid, home) = unsafe {
            let pw = &*pw;
            let home = CStr::from_ptr(pw.pw_dir).to_string_lossy().into_owned();
            (pw.pw_uid, pw.pw_gid, PathBuf::from(home))
        };

        Ok(Self {
            name: name.to_string(),
            uid,
            gid,
            home,
        })
    }
}

impl Ownership for ServiceAccount {
    #[cfg(unix)]
    fn apply(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::chown;

        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path) {
                let entry = entry.map_err(io::Error::from)?;
                chown(entry.path(), Some(self.uid), Some(self.gid))?;
            }
            Ok(())
        } else {
            chown(path, Some(self.uid), Some(self.gid))
        }
    }

    #[cfg(not(unix))]
    fn apply(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_current_owner_is_a_noop() {
        KeepCurrentOwner.apply(Path::new("/definitely/missing")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn lookup_root_resolves() {
        let account = ServiceAccount::lookup("root").unwrap();
        assert_eq!(account.uid, 0);
        assert_eq!(account.name, "root");
    }

    #[cfg(unix)]
    #[test]
    fn lookup_unknown_account_fails() {
        let err = ServiceAccount::lookup("no-such-account-xyz").unwrap_err();
        assert!(matches!(err, Error::UnknownAccount { .. }), "got: {err:?}");
    }
}
