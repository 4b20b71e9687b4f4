//! Shared fixtures for addon-core integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use addon_core::state::InstalledAddon;
use addon_repo::{IndexSource, PackageFetcher, Release, RepositoryIndex};

/// Base URL all test catalogs resolve package paths against.
pub const BASE_URL: &str = "https://mirror.test/leia";

pub fn leia() -> Release {
    Release::parse("leia").unwrap()
}

/// Parse a catalog document the way the engine would.
pub fn index(doc: &str) -> RepositoryIndex {
    RepositoryIndex::parse(leia(), BASE_URL, doc).unwrap()
}

pub fn v(s: &str) -> semver::Version {
    addon_repo::constraint::parse_version(s).unwrap()
}

/// Build an installed-state map from `(id, version, enabled, as_dependency)`.
pub fn installed(entries: &[(&str, &str, bool, bool)]) -> BTreeMap<String, InstalledAddon> {
    entries
        .iter()
        .map(|&(id, version, enabled, installed_as_dependency)| {
            (
                id.to_string(),
                InstalledAddon {
                    id: id.to_string(),
                    version: v(version),
                    enabled,
                    installed_as_dependency,
                },
            )
        })
        .collect()
}

/// Build a zip archive in memory.
pub fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A plausible addon package: `<id>/addon.json` plus an entry point.
pub fn addon_package(id: &str, version: &str) -> Vec<u8> {
    let manifest = format!(r#"{{"id": "{id}", "version": "{version}"}}"#);
    build_zip(&[
        (&format!("{id}/addon.json"), manifest.as_bytes()),
        (&format!("{id}/main.py"), b"print('hi')" as &[u8]),
    ])
}

/// In-memory index source serving one fixed catalog document.
pub struct StaticIndex {
    pub document: String,
}

impl StaticIndex {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

#[async_trait]
impl IndexSource for StaticIndex {
    async fn fetch_index(&self, release: &Release) -> addon_repo::Result<RepositoryIndex> {
        RepositoryIndex::parse(release.clone(), BASE_URL, &self.document)
    }
}

/// Index source that always fails, for transport-error paths.
pub struct UnavailableIndex;

#[async_trait]
impl IndexSource for UnavailableIndex {
    async fn fetch_index(&self, _release: &Release) -> addon_repo::Result<RepositoryIndex> {
        Err(addon_repo::Error::IndexUnavailable {
            url: format!("{BASE_URL}/addons.json"),
            reason: "connection refused".to_string(),
        })
    }
}

/// In-memory package fetcher keyed by URL, counting fetches.
pub struct MapFetcher {
    packages: HashMap<String, Vec<u8>>,
    fetches: AtomicU32,
}

impl MapFetcher {
    pub fn new() -> Self {
        Self {
            packages: HashMap::new(),
            fetches: AtomicU32::new(0),
        }
    }

    pub fn with_package(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.packages.insert(url.into(), bytes);
        self
    }

    pub fn fetch_count(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageFetcher for MapFetcher {
    async fn fetch_package(&self, id: &str, url: &str) -> addon_repo::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.packages
            .get(url)
            .cloned()
            .ok_or_else(|| addon_repo::Error::PackageUnavailable {
                id: id.to_string(),
                url: url.to_string(),
                reason: "not found".to_string(),
            })
    }
}

/// Package URL the test catalog entries use for `id`/`version`.
pub fn package_url(id: &str, version: &str) -> String {
    format!("{BASE_URL}/{id}/{id}-{version}.zip")
}

/// One catalog entry as a JSON fragment.
pub fn catalog_entry(
    id: &str,
    version: &str,
    checksum: Option<&str>,
    requires: &[(&str, Option<&str>)],
) -> String {
    let requires_json: Vec<String> = requires
        .iter()
        .map(|(addon, range)| match range {
            Some(range) => format!(r#"{{"addon": "{addon}", "version": "{range}"}}"#),
            None => format!(r#"{{"addon": "{addon}"}}"#),
        })
        .collect();
    let checksum_field = match checksum {
        Some(checksum) => format!(r#", "checksum": "{checksum}""#),
        None => String::new(),
    };
    format!(
        r#"{{"id": "{id}", "version": "{version}", "path": "{id}/{id}-{version}.zip"{checksum_field}, "requires": [{}]}}"#,
        requires_json.join(", ")
    )
}

/// Wrap entries into a catalog document.
pub fn catalog(entries: &[String]) -> String {
    format!(r#"{{"version": "1", "addons": [{}]}}"#, entries.join(", "))
}
