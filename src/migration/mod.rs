//! # Migration Engine
//!
//! This module drives changes from an origin to a destination.
//!
//! - **`Workflow`** (`workflow`): the resolved building blocks of one
//!   workflow file: origin, destination, transformation pipeline, review
//!   reader and policies.
//! - **`ChangeMigrator`** (`migrator`): moves a single change through the
//!   per-change state machine and records its effects.
//! - **`WorkflowRunner`** (`runner`): sequences changes through the migrator
//!   for one run, applies the failure policy and fires the run-level events.
//! - **`validation`**: consistency checks between transformation and commit.
//!
//! ## Per-change states
//!
//! ```text
//! PENDING -> FETCHED -> TRANSFORMED -> VALIDATED -> COMMITTED -> EFFECT_RECORDED -> DONE
//!    |          |                         |
//!    +----------+-------------------------+----> SKIPPED | FAILED
//! ```

pub mod migrator;
pub mod runner;
pub mod validation;
pub mod workflow;

pub use migrator::{ChangeMigrator, ChangeOutcome};
pub use runner::{CancellationToken, MigrationRun, WorkflowRunner};
pub use validation::Verdict;
pub use workflow::Workflow;

use std::fmt;

use crate::change::{Change, Revision};

/// Where a change is in its migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MigrationState {
    Pending,
    Fetched,
    Transformed,
    Validated,
    Committed,
    EffectRecorded,
    Done,
    Skipped,
    Failed,
}

impl MigrationState {
    /// `Done`, `Skipped` and `Failed` are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MigrationState::Done | MigrationState::Skipped | MigrationState::Failed
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: MigrationState) -> bool {
        use MigrationState::*;
        match (self, next) {
            (Pending, Fetched)
            | (Fetched, Transformed)
            | (Transformed, Validated)
            | (Validated, Committed)
            | (Committed, EffectRecorded)
            | (EffectRecorded, Done) => true,
            (Pending | Fetched | Validated, Skipped | Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MigrationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MigrationState::Pending => "PENDING",
            MigrationState::Fetched => "FETCHED",
            MigrationState::Transformed => "TRANSFORMED",
            MigrationState::Validated => "VALIDATED",
            MigrationState::Committed => "COMMITTED",
            MigrationState::EffectRecorded => "EFFECT_RECORDED",
            MigrationState::Done => "DONE",
            MigrationState::Skipped => "SKIPPED",
            MigrationState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// Every processed change was migrated or skipped.
    Success,
    /// Nothing was pending.
    NoOp,
    /// The run aborted.
    Error,
    /// Best-effort run in which at least one change failed.
    PartialSuccess,
}

impl ExitStatus {
    /// Process exit code. `2` is left to command-line usage errors.
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Error => 1,
            ExitStatus::NoOp => 4,
            ExitStatus::PartialSuccess => 5,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExitStatus::Success => "SUCCESS",
            ExitStatus::NoOp => "NO_OP",
            ExitStatus::Error => "ERROR",
            ExitStatus::PartialSuccess => "PARTIAL_SUCCESS",
        };
        f.write_str(name)
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        match status {
            ExitStatus::Success => std::process::ExitCode::SUCCESS,
            ExitStatus::Error => std::process::ExitCode::FAILURE,
            ExitStatus::NoOp => std::process::ExitCode::from(4),
            ExitStatus::PartialSuccess => std::process::ExitCode::from(5),
        }
    }
}

/// What an info query found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationInfo {
    pub workflow: String,
    pub origin: String,
    pub destination: String,
    /// Bookmark the next run resumes after.
    pub last_migrated: Option<Revision>,
    /// Changes the next run would migrate, oldest first.
    pub pending: Vec<Change>,
}
