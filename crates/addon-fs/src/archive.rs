//! Zip archive extraction
//!
//! Extracts downloaded addon packages. Every entry path is sanitized before
//! it touches the filesystem: absolute paths, drive prefixes, and `..`
//! components are rejected so an archive can never write outside its
//! destination directory.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use crate::{Error, Result};

/// Extract a zip archive held in memory into `dest_dir`.
///
/// The destination directory is created if missing. Entries are written
/// exactly as listed; no entry may escape `dest_dir`.
///
/// # Errors
///
/// Returns [`Error::Archive`] if the buffer is not a valid zip archive,
/// [`Error::UnsafeArchivePath`] if any entry path escapes the destination.
pub fn extract_zip(bytes: &[u8], dest_dir: &Path) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Archive {
        message: e.to_string(),
    })?;

    fs::create_dir_all(dest_dir).map_err(|e| Error::io(dest_dir, e))?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|e| Error::Archive {
            message: e.to_string(),
        })?;
        let raw = entry.name().replace('\\', "/");
        let rel = sanitize_entry_path(Path::new(&raw))?;
        let out = dest_dir.join(&rel);

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| Error::io(&out, e))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out_file = File::create(&out).map_err(|e| Error::io(&out, e))?;
        io::copy(&mut entry, &mut out_file).map_err(|e| Error::io(&out, e))?;
    }

    Ok(())
}

/// Reject archive entry paths that could escape the extraction root.
fn sanitize_entry_path(path: &Path) -> Result<PathBuf> {
    let mut cleaned = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(Error::UnsafeArchivePath {
                    entry: path.to_path_buf(),
                });
            }
            Component::CurDir => {}
            Component::Normal(part) => cleaned.push(part),
        }
    }
    if cleaned.as_os_str().is_empty() {
        return Err(Error::UnsafeArchivePath {
            entry: path.to_path_buf(),
        });
    }
    Ok(cleaned)
}
