//! The convergence engine
//!
//! One engine value per process, one logical run per [`converge`] call:
//! acquire the install-root lock, gather the repository index and installed
//! state (concurrently — they are independent data sources), resolve, plan,
//! execute, report. `absent` requests never touch the repository, so an
//! unreachable mirror cannot block removals.
//!
//! [`converge`]: ConvergenceEngine::converge

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use addon_fs::RunLock;
use addon_repo::{IndexSource, PackageFetcher, Release};

use crate::error::{Error, Result};
use crate::exec::{Executor, ExecutorOptions};
use crate::layout::InstallLayout;
use crate::ownership::Ownership;
use crate::plan::{self, Diagnostic, Plan, TargetState};
use crate::resolve::{self, Resolution};
use crate::state::{InstalledAddon, InstalledStateReader};

/// A declared desired state for one addon on one install root.
#[derive(Debug, Clone)]
pub struct ConvergeRequest {
    /// Root addon id.
    pub name: String,
    /// Platform-release compatibility tag.
    pub release: Release,
    /// Desired target state.
    pub target_state: TargetState,
    /// Addon storage root to converge.
    pub install_root: PathBuf,
}

/// What a convergence run did.
#[derive(Debug, Clone)]
pub struct ConvergeOutcome {
    /// True iff at least one action executed as a non-no-op.
    pub changed: bool,
    /// Descriptions of the applied actions, in completion order.
    pub applied: Vec<String>,
    /// Conditions that produced no action but are worth reporting.
    pub diagnostics: Vec<Diagnostic>,
}

/// Drives installed-addon state toward declared desired state.
pub struct ConvergenceEngine {
    index: Arc<dyn IndexSource>,
    fetcher: Arc<dyn PackageFetcher>,
    ownership: Arc<dyn Ownership>,
    options: ExecutorOptions,
}

impl ConvergenceEngine {
    pub fn new(
        index: Arc<dyn IndexSource>,
        fetcher: Arc<dyn PackageFetcher>,
        ownership: Arc<dyn Ownership>,
    ) -> Self {
        Self::with_options(index, fetcher, ownership, ExecutorOptions::default())
    }

    pub fn with_options(
        index: Arc<dyn IndexSource>,
        fetcher: Arc<dyn PackageFetcher>,
        ownership: Arc<dyn Ownership>,
        options: ExecutorOptions,
    ) -> Self {
        Self {
            index,
            fetcher,
            ownership,
            options,
        }
    }

    /// Run one convergence: compute and apply the plan for `request`.
    ///
    /// Idempotent: repeating a successful run yields `changed = false` and
    /// identical installed state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentRunDetected`] without blocking if another
    /// run holds the install-root lock; resolution and repository errors
    /// abort before any mutation.
    pub async fn converge(&self, request: &ConvergeRequest) -> Result<ConvergeOutcome> {
        let layout = InstallLayout::new(&request.install_root);
        tracing::info!(
            addon = %request.name,
            release = %request.release,
            target = %request.target_state,
            root = %layout.root().display(),
            "starting convergence run"
        );

        let _lock = RunLock::acquire(&layout.lock_file()).map_err(|e| match e {
            addon_fs::Error::LockBusy { .. } => Error::ConcurrentRunDetected {
                root: layout.root().to_path_buf(),
            },
            other => Error::Fs(other),
        })?;

        let (desired, installed) = self.gather(request, &layout).await?;
        let plan = plan::build(&request.name, request.target_state, desired.as_ref(), &installed);
        for diagnostic in &plan.diagnostics {
            tracing::warn!(%diagnostic);
        }
        tracing::debug!(actions = plan.actions.len(), "plan computed");

        let executor = Executor::with_options(
            layout,
            self.fetcher.clone(),
            self.ownership.clone(),
            self.options.clone(),
        );
        let report = executor.apply(&plan, desired.as_ref(), &installed).await?;

        Ok(ConvergeOutcome {
            changed: report.changed,
            applied: report.applied,
            diagnostics: plan.diagnostics,
        })
    }

    /// Compute the plan for `request` without acquiring the lock or applying
    /// anything. Backs check/dry-run modes.
    pub async fn preview(&self, request: &ConvergeRequest) -> Result<Plan> {
        let layout = InstallLayout::new(&request.install_root);
        let (desired, installed) = self.gather(request, &layout).await?;
        Ok(plan::build(&request.name, request.target_state, desired.as_ref(), &installed))
    }

    /// Fetch the index and read installed state. The two sources are
    /// independent, so non-absent targets gather them concurrently.
    async fn gather(
        &self,
        request: &ConvergeRequest,
        layout: &InstallLayout,
    ) -> Result<(Option<Resolution>, BTreeMap<String, InstalledAddon>)> {
        let reader = InstalledStateReader::new(layout.clone());

        if request.target_state == TargetState::Absent {
            return Ok((None, reader.read()?));
        }

        let fetch = self.index.fetch_index(&request.release);
        let read = tokio::task::spawn_blocking(move || reader.read());
        let (index, installed) = tokio::join!(fetch, read);
        let index = index?;
        let installed = installed.map_err(|e| Error::Io(std::io::Error::other(e)))??;

        let resolution = resolve::resolve(&request.name, &index)?;
        Ok((Some(resolution), installed))
    }
}
