//! HTTP repository client and fetch seams
//!
//! The convergence engine talks to the repository through two narrow traits:
//! [`IndexSource`] for the per-release catalog and [`PackageFetcher`] for
//! package archives. [`HttpRepository`] implements both over HTTP(S); tests
//! substitute in-memory implementations.

use async_trait::async_trait;

use addon_fs::checksum;

use crate::catalog::RepositoryIndex;
use crate::error::{Error, Result};
use crate::release::Release;

/// Default repository mirror; overridable per request.
pub const DEFAULT_REPOSITORY_URL: &str = "https://mirrors.mediacenter.example/addons";

/// Catalog document filename under the per-release base URL.
pub const CATALOG_FILENAME: &str = "addons.json";

/// Companion digest document filename, holding the catalog's `sha256:<hex>`.
pub const CATALOG_DIGEST_FILENAME: &str = "addons.json.sha256";

/// Source of the per-release repository index.
///
/// A fresh fetch happens on every convergence run so newly published addon
/// versions are always visible.
#[async_trait]
pub trait IndexSource: Send + Sync {
    /// Fetch and verify the catalog for `release`.
    async fn fetch_index(&self, release: &Release) -> Result<RepositoryIndex>;
}

/// Fetcher for package archives by URL.
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Fetch the raw archive bytes for addon `id` from `url`.
    async fn fetch_package(&self, id: &str, url: &str) -> Result<Vec<u8>>;
}

/// HTTP(S) implementation of both fetch seams.
#[derive(Debug, Clone)]
pub struct HttpRepository {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRepository {
    /// Create a client against `base_url` (no trailing slash needed).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    /// Base URL for one release's catalog and packages.
    pub fn release_base(&self, release: &Release) -> String {
        format!("{}/{}", self.base_url, release)
    }

    /// URL of the catalog document for `release`.
    pub fn catalog_url(&self, release: &Release) -> String {
        format!("{}/{}", self.release_base(release), CATALOG_FILENAME)
    }

    /// URL of the companion digest document for `release`.
    pub fn digest_url(&self, release: &Release) -> String {
        format!("{}/{}", self.release_base(release), CATALOG_DIGEST_FILENAME)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::IndexUnavailable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        response.text().await.map_err(|e| Error::IndexUnavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl IndexSource for HttpRepository {
    async fn fetch_index(&self, release: &Release) -> Result<RepositoryIndex> {
        let catalog_url = self.catalog_url(release);
        let digest_url = self.digest_url(release);

        tracing::info!(url = %catalog_url, "fetching repository catalog");
        let document = self.get_text(&catalog_url).await?;
        let digest = self.get_text(&digest_url).await?;

        if !checksum::matches(&digest, document.as_bytes()) {
            return Err(Error::IndexCorrupt {
                url: catalog_url,
                expected: digest.trim().to_string(),
            });
        }

        RepositoryIndex::parse(release.clone(), &self.release_base(release), &document)
    }
}

#[async_trait]
impl PackageFetcher for HttpRepository {
    async fn fetch_package(&self, id: &str, url: &str) -> Result<Vec<u8>> {
        tracing::info!(addon = id, url, "downloading package");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::PackageUnavailable {
                id: id.to_string(),
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let bytes = response.bytes().await.map_err(|e| Error::PackageUnavailable {
            id: id.to_string(),
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
