//! Dependency resolution and state convergence for media-center addons
//!
//! The engine in this crate drives the installed-addon state of an install
//! root toward a declared desired state: a named addon, at a platform
//! release, in one of four target states (`present`/`enabled`, `disabled`,
//! `absent`). One run fetches the repository index, reads installed state,
//! resolves the dependency closure, diffs the two into an ordered action
//! plan, and applies it.
//!
//! All mutation flows through the [`exec::Executor`]; the resolver and
//! planner are pure and independently testable.

pub mod engine;
pub mod error;
pub mod exec;
pub mod layout;
pub mod ownership;
pub mod plan;
pub mod resolve;
pub mod state;

pub use engine::{ConvergeOutcome, ConvergeRequest, ConvergenceEngine};
pub use error::{Error, Result};
pub use layout::InstallLayout;
pub use plan::{Action, ActionKind, Diagnostic, Plan, TargetState};
pub use resolve::Resolution;
pub use state::{InstalledAddon, InstalledStateReader, StateRecord};
