//! Per-release repository index
//!
//! The catalog document is a JSON listing of addon descriptors for one
//! platform release. The index groups descriptors by id with candidate
//! versions sorted highest-first, which is the order resolution wants them
//! in.
//!
//! ```json
//! {
//!   "version": "1",
//!   "addons": [
//!     {"id": "plugin.demo", "version": "1.0.0", "path": "plugin.demo/plugin.demo-1.0.0.zip",
//!      "checksum": "sha256:…", "requires": [{"addon": "scraper.common", "version": ">=1.0"}]}
//!   ]
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::descriptor::{AddonDescriptor, RawDescriptor};
use crate::error::{Error, Result};
use crate::release::Release;

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    addons: Vec<RawDescriptor>,
}

/// The parsed catalog for one release: candidate descriptors per addon id.
///
/// Built fresh per convergence run; never cached across process invocations.
#[derive(Debug, Clone)]
pub struct RepositoryIndex {
    release: Release,
    entries: HashMap<String, Vec<AddonDescriptor>>,
}

impl RepositoryIndex {
    /// Parse a catalog document, resolving relative package paths against
    /// `base_url` (the release's catalog base).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedDescriptor`] if the document is not valid
    /// JSON or any entry is missing a required field.
    pub fn parse(release: Release, base_url: &str, document: &str) -> Result<Self> {
        let raw: RawCatalog =
            serde_json::from_str(document).map_err(|e| Error::MalformedDescriptor {
                id: "<catalog>".to_string(),
                reason: format!("catalog is not valid JSON: {e}"),
            })?;

        let mut entries: HashMap<String, Vec<AddonDescriptor>> = HashMap::new();
        for raw_desc in raw.addons {
            let desc = raw_desc.validate(base_url)?;
            entries.entry(desc.id.clone()).or_default().push(desc);
        }

        // Highest version first; duplicate (id, version) entries collapse to
        // the first occurrence.
        for candidates in entries.values_mut() {
            candidates.sort_by(|a, b| b.version.cmp(&a.version));
            candidates.dedup_by(|a, b| a.version == b.version);
        }

        tracing::debug!(
            release = %release,
            addons = entries.len(),
            "parsed repository catalog"
        );

        Ok(Self { release, entries })
    }

    /// The release this index was fetched for.
    pub fn release(&self) -> &Release {
        &self.release
    }

    /// Candidate descriptors for `id`, highest version first. Empty when the
    /// id is absent from the catalog.
    pub fn candidates(&self, id: &str) -> &[AddonDescriptor] {
        self.entries.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the catalog lists `id` at all.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Number of distinct addon ids in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index lists no addons.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
