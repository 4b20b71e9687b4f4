//! Plan execution
//!
//! The Executor is the only component that mutates the install root. It
//! processes a plan in rank order: installs first (bounded-parallel,
//! per-id exclusive), then enable/disable/remove serially. Each action is
//! individually atomic and persisted to the state record as it lands; the
//! plan as a whole is not transactional, so a failed run leaves prior
//! actions applied and a re-run converges on the remainder.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use addon_fs::{archive, checksum, io as fsio};
use addon_repo::{AddonDescriptor, PackageFetcher};

use crate::error::{Error, Result};
use crate::layout::InstallLayout;
use crate::ownership::Ownership;
use crate::plan::{ActionKind, Plan};
use crate::resolve::Resolution;
use crate::state::{InstalledAddon, StateRecord};

/// Tunables for plan execution.
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Maximum concurrent package downloads/extractions.
    pub parallel_installs: usize,
    /// Re-fetch attempts after a checksum mismatch before surfacing
    /// `PackageCorrupt`.
    pub checksum_retries: u32,
    /// Initial delay of the re-fetch backoff schedule.
    pub retry_initial_delay: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            parallel_installs: 4,
            checksum_retries: 3,
            retry_initial_delay: Duration::from_millis(500),
        }
    }
}

/// Result of applying a plan.
#[derive(Debug, Clone, Default)]
pub struct ExecReport {
    /// True iff at least one action executed as a non-no-op.
    pub changed: bool,
    /// Human-readable descriptions of the actions that changed something,
    /// in completion order.
    pub applied: Vec<String>,
}

/// Applies convergence plans to an install root.
pub struct Executor {
    layout: InstallLayout,
    fetcher: Arc<dyn PackageFetcher>,
    ownership: Arc<dyn Ownership>,
    options: ExecutorOptions,
}

impl Executor {
    pub fn new(
        layout: InstallLayout,
        fetcher: Arc<dyn PackageFetcher>,
        ownership: Arc<dyn Ownership>,
    ) -> Self {
        Self::with_options(layout, fetcher, ownership, ExecutorOptions::default())
    }

    pub fn with_options(
        layout: InstallLayout,
        fetcher: Arc<dyn PackageFetcher>,
        ownership: Arc<dyn Ownership>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            layout,
            fetcher,
            ownership,
            options,
        }
    }

    /// Apply `plan` in rank order.
    ///
    /// An empty plan performs zero I/O. The first hard failure aborts the
    /// remaining plan; already-applied actions stay applied.
    ///
    /// `desired` supplies the descriptors for install actions; `installed`
    /// supplies version fallbacks when enabling an addon that predates the
    /// state record.
    pub async fn apply(
        &self,
        plan: &Plan,
        desired: Option<&Resolution>,
        installed: &BTreeMap<String, InstalledAddon>,
    ) -> Result<ExecReport> {
        let mut report = ExecReport::default();
        if plan.is_empty() {
            return Ok(report);
        }

        let record_path = self.layout.state_record();
        let mut record = StateRecord::load(&record_path)?;

        self.run_installs(plan, desired, &mut record, &mut report).await?;

        for action in plan.post_install() {
            let changed = match action.kind {
                ActionKind::Enable => self.set_enabled(&mut record, &action.id, true, desired, installed),
                ActionKind::Disable => {
                    self.set_enabled(&mut record, &action.id, false, desired, installed)
                }
                ActionKind::Remove => self.remove(&mut record, &action.id)?,
                // Installs were handled in the first phase.
                ActionKind::Install { .. } => continue,
            };
            record.save(&record_path)?;
            self.ownership.apply(&record_path)?;
            if changed {
                tracing::info!(action = %action, "applied");
                report.applied.push(action.to_string());
                report.changed = true;
            }
        }

        Ok(report)
    }

    /// Run all install actions under a bounded worker pool. Independent
    /// siblings download and extract concurrently; an install whose graph
    /// dependency is itself being installed waits for it. Every install
    /// completes (or the whole phase fails) before any later action runs.
    async fn run_installs(
        &self,
        plan: &Plan,
        desired: Option<&Resolution>,
        record: &mut StateRecord,
        report: &mut ExecReport,
    ) -> Result<()> {
        let mut pending: BTreeMap<String, (AddonDescriptor, bool)> = BTreeMap::new();
        for action in plan.installs() {
            let as_dependency = matches!(action.kind, ActionKind::Install { as_dependency: true });
            let descriptor = desired
                .and_then(|d| d.get(&action.id))
                .cloned()
                .ok_or_else(|| Error::UnknownAddon {
                    id: action.id.clone(),
                })?;
            pending.insert(action.id.clone(), (descriptor, as_dependency));
        }
        if pending.is_empty() {
            return Ok(());
        }

        let packages_dir = self.layout.packages_dir();
        fs::create_dir_all(&packages_dir).map_err(|e| addon_fs::Error::io(&packages_dir, e))?;

        // In-set dependency edges; an id spawns only once every in-set
        // dependency has completed. Chains serialize by induction on the
        // direct edges.
        let mut blocked_on: BTreeMap<String, BTreeSet<String>> = pending
            .keys()
            .map(|id| {
                let deps = desired
                    .map(|d| d.dependencies_of(id))
                    .unwrap_or(&[])
                    .iter()
                    .filter(|dep| pending.contains_key(*dep))
                    .cloned()
                    .collect();
                (id.clone(), deps)
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.options.parallel_installs.max(1)));
        let mut tasks = JoinSet::new();
        let record_path = self.layout.state_record();

        while !pending.is_empty() || !tasks.is_empty() {
            let ready: Vec<String> = pending
                .keys()
                .filter(|id| blocked_on.get(*id).is_none_or(BTreeSet::is_empty))
                .cloned()
                .collect();
            for id in ready {
                blocked_on.remove(&id);
                let Some((descriptor, as_dependency)) = pending.remove(&id) else {
                    continue;
                };
                let semaphore = semaphore.clone();
                let worker = InstallWorker {
                    layout: self.layout.clone(),
                    fetcher: self.fetcher.clone(),
                    ownership: self.ownership.clone(),
                    checksum_retries: self.options.checksum_retries,
                    retry_initial_delay: self.options.retry_initial_delay,
                };
                tasks.spawn(async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
                    worker.install(descriptor, as_dependency).await
                });
            }

            let Some(joined) = tasks.join_next().await else {
                // Nothing in flight and nothing ready: only reachable with a
                // cyclic install set, which resolution rules out.
                debug_assert!(pending.is_empty());
                break;
            };
            // Dropping the JoinSet on an early return aborts the remaining
            // workers; they can only have touched staging scratch, which the
            // next run clears before extracting.
            let outcome = joined.map_err(|e| Error::Io(std::io::Error::other(e)))??;
            for blockers in blocked_on.values_mut() {
                blockers.remove(&outcome.id);
            }

            record.record_install(&outcome.id, &outcome.version, outcome.as_dependency);
            record.save(&record_path)?;
            self.ownership.apply(&record_path)?;

            let label = if outcome.as_dependency {
                format!("install {} (dependency)", outcome.id)
            } else {
                format!("install {}", outcome.id)
            };
            tracing::info!(action = %label, version = %outcome.version, "applied");
            report.applied.push(label);
            report.changed = true;
        }

        Ok(())
    }

    /// Flip the record's enabled flag; files are never touched.
    fn set_enabled(
        &self,
        record: &mut StateRecord,
        id: &str,
        enabled: bool,
        desired: Option<&Resolution>,
        installed: &BTreeMap<String, InstalledAddon>,
    ) -> bool {
        // Version used only when upserting an on-disk addon that predates
        // the record.
        let version = installed
            .get(id)
            .map(|addon| addon.version.clone())
            .or_else(|| desired.and_then(|d| d.get(id)).map(|d| d.version.clone()))
            .unwrap_or_else(|| semver::Version::new(0, 0, 0));
        record.set_enabled(id, enabled, &version)
    }

    /// Delete the addon's storage subtree and record row.
    fn remove(&self, record: &mut StateRecord, id: &str) -> Result<bool> {
        let dir = self.layout.addon_dir(id);
        let mut changed = false;

        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|source| Error::RemovalFailed {
                id: id.to_string(),
                path: dir.clone(),
                source,
            })?;
            changed = true;
        }
        if record.remove(id).is_some() {
            changed = true;
        }

        Ok(changed)
    }
}

/// Outcome of one successful install task.
struct InstallOutcome {
    id: String,
    version: semver::Version,
    as_dependency: bool,
}

/// Everything one install task needs, owned so it can move into the pool.
struct InstallWorker {
    layout: InstallLayout,
    fetcher: Arc<dyn PackageFetcher>,
    ownership: Arc<dyn Ownership>,
    checksum_retries: u32,
    retry_initial_delay: Duration,
}

impl InstallWorker {
    /// Download, verify, cache, and atomically unpack one addon.
    ///
    /// Extraction goes through a per-id staging directory followed by a
    /// single rename, so the addon directory either appears complete or not
    /// at all.
    async fn install(&self, descriptor: AddonDescriptor, as_dependency: bool) -> Result<InstallOutcome> {
        let bytes = self.fetch_verified(&descriptor).await?;

        // Keep the verified archive in the packages cache, as the platform
        // itself does.
        let archive_name = descriptor
            .package_url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(&descriptor.id);
        let package_path = self.layout.packages_dir().join(archive_name);
        fsio::write_atomic(&package_path, &bytes)?;
        self.ownership.apply(&package_path)?;

        let staging = self.layout.staging_dir(&descriptor.id);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| addon_fs::Error::io(&staging, e))?;
        }
        if let Err(e) = archive::extract_zip(&bytes, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }

        let source = packaged_root(&staging, &descriptor.id);
        let dest = self.layout.addon_dir(&descriptor.id);
        if dest.exists() {
            // Stale leftover from an earlier aborted run; the planner only
            // installs ids the reader did not report as installed.
            fs::remove_dir_all(&dest).map_err(|e| addon_fs::Error::io(&dest, e))?;
        }
        fs::rename(&source, &dest).map_err(|e| addon_fs::Error::io(&dest, e))?;
        let _ = fs::remove_dir_all(&staging);

        self.ownership.apply(&dest)?;

        Ok(InstallOutcome {
            id: descriptor.id,
            version: descriptor.version,
            as_dependency,
        })
    }

    /// Fetch the package, re-fetching on checksum mismatch up to the
    /// configured retry bound. Transport errors surface immediately; the
    /// caller controls that retry cadence.
    async fn fetch_verified(&self, descriptor: &AddonDescriptor) -> Result<Vec<u8>> {
        let mut schedule = ExponentialBackoff {
            initial_interval: self.retry_initial_delay,
            ..ExponentialBackoff::default()
        };
        let attempts_allowed = 1 + self.checksum_retries;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let bytes = self
                .fetcher
                .fetch_package(&descriptor.id, &descriptor.package_url)
                .await?;

            match &descriptor.checksum {
                None => {
                    tracing::warn!(
                        addon = %descriptor.id,
                        "descriptor carries no checksum, skipping verification"
                    );
                    return Ok(bytes);
                }
                Some(expected) if checksum::matches(expected, &bytes) => return Ok(bytes),
                Some(_) => {
                    if attempt >= attempts_allowed {
                        return Err(Error::PackageCorrupt {
                            id: descriptor.id.clone(),
                            url: descriptor.package_url.clone(),
                            attempts: attempt,
                        });
                    }
                    let delay = schedule.next_backoff().unwrap_or(self.retry_initial_delay);
                    tracing::warn!(
                        addon = %descriptor.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "package failed checksum verification, refetching"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Locate the addon payload inside the staging directory.
///
/// Archives conventionally wrap their content in a `<id>/` directory; fall
/// back to a single top-level directory, then to the staging directory
/// itself.
fn packaged_root(staging: &Path, id: &str) -> PathBuf {
    let direct = staging.join(id);
    if direct.is_dir() {
        return direct;
    }

    if let Ok(entries) = fs::read_dir(staging) {
        let children: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        if let [only] = children.as_slice()
            && only.is_dir()
        {
            return only.clone();
        }
    }

    staging.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn packaged_root_prefers_id_directory() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("plugin.demo")).unwrap();
        fs::create_dir_all(dir.path().join("other")).unwrap();

        assert_eq!(
            packaged_root(dir.path(), "plugin.demo"),
            dir.path().join("plugin.demo")
        );
    }

    #[test]
    fn packaged_root_falls_back_to_single_wrapper() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("plugin.demo-1.0.0")).unwrap();

        assert_eq!(
            packaged_root(dir.path(), "plugin.demo"),
            dir.path().join("plugin.demo-1.0.0")
        );
    }

    #[test]
    fn packaged_root_defaults_to_staging_itself() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("addon.json"), "{}").unwrap();
        fs::write(dir.path().join("main.py"), "").unwrap();

        assert_eq!(packaged_root(dir.path(), "plugin.demo"), dir.path());
    }
}
