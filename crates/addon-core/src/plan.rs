//! Convergence planning
//!
//! The planner is a pure function of three inputs: the desired dependency
//! graph, the current installed state, and the requested target state.
//! Identical inputs always yield an identical plan. The entire enable/
//! disable/remove policy lives in [`build`] — execution code never makes
//! policy decisions.
//!
//! Policy, per requested root id:
//!
//! | target            | root not installed     | installed, disabled | installed, enabled |
//! |-------------------|------------------------|---------------------|--------------------|
//! | present / enabled | install + enable       | enable              | no-op              |
//! | disabled          | install, leave disabled| no-op               | disable            |
//! | absent            | no-op                  | remove              | remove             |
//!
//! Dependencies follow the install-closure rule: a non-root id missing from
//! current state is installed as a dependency and left disabled regardless
//! of the root's target; a non-root id already installed is never touched,
//! even when resolution would prefer a different version (that surfaces as a
//! [`Diagnostic`], never an action). `absent` removes only the root.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::resolve::Resolution;
use crate::state::InstalledAddon;

/// Desired target state for the requested root addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Ensure installed and enabled (synonym of `Enabled`).
    Present,
    /// Ensure installed and enabled.
    Enabled,
    /// Ensure installed and disabled.
    Disabled,
    /// Ensure removed.
    Absent,
}

impl TargetState {
    /// Whether this target wants the root installed.
    pub fn wants_installed(self) -> bool {
        !matches!(self, Self::Absent)
    }

    /// Whether this target wants the root enabled.
    pub fn wants_enabled(self) -> bool {
        matches!(self, Self::Present | Self::Enabled)
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Present => "present",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
            Self::Absent => "absent",
        };
        f.write_str(name)
    }
}

impl FromStr for TargetState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "present" => Ok(Self::Present),
            "enabled" => Ok(Self::Enabled),
            "disabled" => Ok(Self::Disabled),
            "absent" => Ok(Self::Absent),
            other => Err(format!(
                "unknown target state '{other}' (expected present, enabled, disabled or absent)"
            )),
        }
    }
}

/// What an action does to its target addon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Download, verify, unpack, and record (disabled) the addon.
    Install {
        /// Whether the addon enters the record as a dependency install.
        as_dependency: bool,
    },
    /// Set the record's enabled flag. Never touches files.
    Enable,
    /// Clear the record's enabled flag. Never touches files.
    Disable,
    /// Delete the addon's storage subtree and record row.
    Remove,
}

/// One step of a convergence plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    /// Target addon id.
    pub id: String,
    /// Ordering rank; actions execute in ascending rank.
    pub rank: usize,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ActionKind::Install { as_dependency: true } => {
                write!(f, "install {} (dependency)", self.id)
            }
            ActionKind::Install { as_dependency: false } => write!(f, "install {}", self.id),
            ActionKind::Enable => write!(f, "enable {}", self.id),
            ActionKind::Disable => write!(f, "disable {}", self.id),
            ActionKind::Remove => write!(f, "remove {}", self.id),
        }
    }
}

/// A condition worth reporting that deliberately produces no action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// An already-installed addon's version differs from what resolution
    /// selected. Upgrades are out of scope; the state is left untouched.
    VersionDrift {
        id: String,
        installed: semver::Version,
        resolved: semver::Version,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VersionDrift {
                id,
                installed,
                resolved,
            } => write!(
                f,
                "'{id}' is installed at {installed} but resolution selected {resolved}; \
                 leaving it untouched"
            ),
        }
    }
}

/// An ordered action plan plus its diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Actions in execution order (ascending rank).
    pub actions: Vec<Action>,
    /// No-action conditions surfaced to the caller.
    pub diagnostics: Vec<Diagnostic>,
}

impl Plan {
    /// Whether the plan has no actions (diagnostics may still be present).
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Install actions, in rank order.
    pub fn installs(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| matches!(a.kind, ActionKind::Install { .. }))
    }

    /// Non-install actions, in rank order.
    pub fn post_install(&self) -> impl Iterator<Item = &Action> {
        self.actions
            .iter()
            .filter(|a| !matches!(a.kind, ActionKind::Install { .. }))
    }
}

/// Diff the desired graph against current state into an ordered plan.
///
/// `desired` must be `Some` for every target except [`TargetState::Absent`],
/// which plans purely from current state.
pub fn build(
    root_id: &str,
    target: TargetState,
    desired: Option<&Resolution>,
    installed: &BTreeMap<String, InstalledAddon>,
) -> Plan {
    let mut plan = Plan::default();

    if target == TargetState::Absent {
        // Removal is root-only; dependencies are never removed, and a root
        // that is not installed is a no-op.
        if installed.contains_key(root_id) {
            push(&mut plan, ActionKind::Remove, root_id);
        }
        return plan;
    }

    debug_assert!(desired.is_some(), "non-absent targets require a resolved graph");
    let Some(desired) = desired else {
        return plan;
    };

    // Install-closure: missing dependencies install disabled, in
    // dependency-first order; present dependencies stay untouched.
    for id in desired.topological_order() {
        if id == root_id {
            continue;
        }
        match installed.get(&id) {
            None => push(&mut plan, ActionKind::Install { as_dependency: true }, &id),
            Some(current) => diagnose_drift(&mut plan, desired, current),
        }
    }

    match installed.get(root_id) {
        None => {
            push(&mut plan, ActionKind::Install { as_dependency: false }, root_id);
            // Installs always enter the record disabled; reaching
            // present/enabled takes an explicit enable step.
            if target.wants_enabled() {
                push(&mut plan, ActionKind::Enable, root_id);
            }
        }
        Some(current) => {
            diagnose_drift(&mut plan, desired, current);
            if target.wants_enabled() && !current.enabled {
                push(&mut plan, ActionKind::Enable, root_id);
            } else if !target.wants_enabled() && current.enabled {
                push(&mut plan, ActionKind::Disable, root_id);
            }
        }
    }

    plan
}

fn push(plan: &mut Plan, kind: ActionKind, id: &str) {
    let rank = plan.actions.len();
    plan.actions.push(Action {
        kind,
        id: id.to_string(),
        rank,
    });
}

fn diagnose_drift(plan: &mut Plan, desired: &Resolution, current: &InstalledAddon) {
    if let Some(selected) = desired.get(&current.id)
        && selected.version != current.version
    {
        plan.diagnostics.push(Diagnostic::VersionDrift {
            id: current.id.clone(),
            installed: current.version.clone(),
            resolved: selected.version.clone(),
        });
    }
}
