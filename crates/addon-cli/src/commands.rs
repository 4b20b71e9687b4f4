//! Command implementations

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use addon_core::engine::{ConvergeRequest, ConvergenceEngine};
use addon_core::exec::ExecutorOptions;
use addon_core::layout::InstallLayout;
use addon_core::ownership::Ownership;
use addon_core::plan::TargetState;
use addon_core::state::InstalledStateReader;
use addon_repo::{HttpRepository, Release};

use crate::error::{Error, Result};

/// Resolve the install root and ownership collaborator from `--root`/`--user`.
///
/// Without an explicit root, the service account's data directory is used,
/// and installed files always end up owned by that account.
#[cfg(unix)]
fn resolve_target(root: Option<PathBuf>, user: &str) -> Result<(PathBuf, Arc<dyn Ownership>)> {
    use addon_core::ownership::ServiceAccount;

    let account = ServiceAccount::lookup(user)?;
    let root = root.unwrap_or_else(|| {
        InstallLayout::for_account_home(&account.home).root().to_path_buf()
    });
    Ok((root, Arc::new(account)))
}

#[cfg(not(unix))]
fn resolve_target(root: Option<PathBuf>, _user: &str) -> Result<(PathBuf, Arc<dyn Ownership>)> {
    use addon_core::ownership::KeepCurrentOwner;

    let root = root
        .or_else(|| InstallLayout::for_current_user().map(|l| l.root().to_path_buf()))
        .ok_or_else(|| Error::Usage("--root is required on this platform".to_string()))?;
    Ok((root, Arc::new(KeepCurrentOwner)))
}

#[allow(clippy::too_many_arguments)]
pub async fn run_apply(
    name: String,
    release: &str,
    state: &str,
    root: Option<PathBuf>,
    user: &str,
    repository_url: String,
    check: bool,
    jobs: usize,
) -> Result<()> {
    let target_state: TargetState = state.parse().map_err(Error::Usage)?;
    let release = Release::parse(release)?;
    let (install_root, ownership) = resolve_target(root, user)?;

    let repository = Arc::new(HttpRepository::new(repository_url));
    let engine = ConvergenceEngine::with_options(
        repository.clone(),
        repository,
        ownership,
        ExecutorOptions {
            parallel_installs: jobs,
            ..ExecutorOptions::default()
        },
    );
    let request = ConvergeRequest {
        name,
        release,
        target_state,
        install_root,
    };

    if check {
        let plan = engine.preview(&request).await?;
        for action in &plan.actions {
            println!("{} {}", "would".cyan(), action);
        }
        for diagnostic in &plan.diagnostics {
            println!("{} {}", "note".yellow(), diagnostic);
        }
        report_changed(!plan.is_empty());
        return Ok(());
    }

    let outcome = engine.converge(&request).await?;
    for action in &outcome.applied {
        println!("{} {}", "applied".green(), action);
    }
    for diagnostic in &outcome.diagnostics {
        println!("{} {}", "note".yellow(), diagnostic);
    }
    report_changed(outcome.changed);
    Ok(())
}

pub fn run_list(root: Option<PathBuf>, user: &str) -> Result<()> {
    let (install_root, _ownership) = resolve_target(root, user)?;
    let reader = InstalledStateReader::new(InstallLayout::new(&install_root));
    let installed = reader.read()?;

    if installed.is_empty() {
        println!("no addons installed under {}", install_root.display());
        return Ok(());
    }

    for addon in installed.values() {
        let status = if addon.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        };
        let origin = if addon.installed_as_dependency {
            " (dependency)"
        } else {
            ""
        };
        println!("{}  {}  {}{}", addon.id.bold(), addon.version, status, origin);
    }
    Ok(())
}

fn report_changed(changed: bool) {
    if changed {
        println!("{}", "changed".green().bold());
    } else {
        println!("{}", "unchanged".dimmed());
    }
}
