//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! catalog digest verification and package integrity checks.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix for all checksums produced by this module
const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of a byte buffer.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}{:x}", PREFIX, hasher.finalize())
}

/// Compute the SHA-256 checksum of a file's contents.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn compute_file_checksum(path: &Path) -> std::io::Result<String> {
    let content = std::fs::read(path)?;
    Ok(compute_checksum(&content))
}

/// Check a byte buffer against an expected checksum string.
///
/// The expected value may carry the `sha256:` prefix or be a bare hex digest;
/// comparison is case-insensitive on the hex part.
pub fn matches(expected: &str, bytes: &[u8]) -> bool {
    let expected = expected.trim();
    let expected_hex = expected.strip_prefix(PREFIX).unwrap_or(expected);
    let actual = compute_checksum(bytes);
    let actual_hex = &actual[PREFIX.len()..];
    expected_hex.eq_ignore_ascii_case(actual_hex)
}
