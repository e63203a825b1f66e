//! Sequencing a run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::change::{Change, Revision};
use crate::config::WorkflowMode;
use crate::effects::{DestinationEffect, EffectLog};
use crate::error::{Error, Result};
use crate::migration::migrator::ChangeMigrator;
use crate::migration::{ExitStatus, MigrationInfo, MigrationState, Workflow};
use crate::monitor::{
    EventDispatcher, EventMonitor, InfoFinishedEvent, MigrationFinishedEvent, MigrationStartedEvent,
};
use crate::options::{FailurePolicy, MigrationOptions};
use crate::retry::RetryPolicy;

/// Requests that a run stop before its next change.
///
/// A change already in flight always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Record of one invocation.
#[derive(Debug)]
pub struct MigrationRun {
    pub workflow: String,
    /// Changes taken from the origin, in processing order.
    pub changes: Vec<Change>,
    /// Number of changes that reached a terminal state.
    pub cursor: usize,
    /// Every effect of the run, in commit order.
    pub effects: Vec<DestinationEffect>,
    pub failed: usize,
    pub exit_status: ExitStatus,
    /// The error that aborted the run, if it aborted.
    pub error: Option<Error>,
}

/// Runs a [`Workflow`] under one set of options.
pub struct WorkflowRunner {
    workflow: Workflow,
    policy: FailurePolicy,
    retry: RetryPolicy,
    page_size: usize,
    last_rev: Option<Revision>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl WorkflowRunner {
    pub fn new(workflow: Workflow, options: &MigrationOptions) -> Self {
        Self {
            workflow,
            policy: options.failure_policy,
            retry: options.retry,
            page_size: options.page_size.max(1),
            last_rev: options.last_rev.clone(),
            events: EventDispatcher::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_monitor(mut self, monitor: Box<dyn EventMonitor>) -> Self {
        self.events.register(monitor);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Observer failures recorded so far.
    pub fn monitor_failures(&self) -> &[Error] {
        self.events.failures()
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Migrate every pending change (or the oldest one in single mode).
    ///
    /// Always emits exactly one `MigrationStarted` and one
    /// `MigrationFinished`, whatever happens in between.
    pub fn run(&mut self) -> MigrationRun {
        let mut run = MigrationRun {
            workflow: self.workflow.name.clone(),
            changes: Vec::new(),
            cursor: 0,
            effects: Vec::new(),
            failed: 0,
            exit_status: ExitStatus::Success,
            error: None,
        };

        self.events.reset();
        self.events.migration_started(&MigrationStartedEvent {
            workflow: self.workflow.name.clone(),
        });

        let mut log = EffectLog::new();
        let result = self.process(&mut run, &mut log);
        run.exit_status = match result {
            Err(e) => {
                error!("Migration of '{}' aborted: {}", run.workflow, e);
                run.error = Some(e);
                ExitStatus::Error
            }
            Ok(()) if run.cursor == 0 => ExitStatus::NoOp,
            Ok(()) if run.failed > 0 => ExitStatus::PartialSuccess,
            Ok(()) => ExitStatus::Success,
        };

        if let Some(reviews) = self.workflow.reviews.as_mut() {
            reviews.discard_memo();
        }
        self.events.migration_finished(&MigrationFinishedEvent {
            exit_status: run.exit_status,
            effects: log.as_slice(),
        });
        run.effects = log.into_vec();
        run
    }

    fn process(&mut self, run: &mut MigrationRun, log: &mut EffectLog) -> Result<()> {
        let since = self.prepare()?;

        let Workflow {
            origin,
            destination,
            transformation,
            reviews,
            empty_diff,
            mode,
            authoring,
            ..
        } = &mut self.workflow;
        let limit = match mode {
            WorkflowMode::Single => 1,
            WorkflowMode::Batch => usize::MAX,
        };

        let stream = origin.changes(since.as_ref(), self.page_size)?;
        for item in stream.take(limit) {
            if self.cancel.is_cancelled() {
                info!("Cancellation requested, stopping before the next change");
                return Err(Error::Cancelled);
            }
            let change = item?;
            run.changes.push(change.clone());

            let mut migrator = ChangeMigrator {
                origin: &**origin,
                destination: &mut **destination,
                transformation: &**transformation,
                reviews: reviews.as_mut(),
                retry: self.retry,
                empty_diff: *empty_diff,
                authoring: &*authoring,
            };
            let outcome = migrator.migrate(&change, log, &mut self.events);
            run.cursor += 1;

            if outcome.state != MigrationState::Failed {
                continue;
            }
            run.failed += 1;
            if let Some(e) = outcome.error {
                if e.is_run_fatal() || (self.policy == FailurePolicy::FailFast && outcome.escalate) {
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Refresh the destination and work out where to resume.
    fn prepare(&mut self) -> Result<Option<Revision>> {
        let destination = &mut self.workflow.destination;
        self.retry
            .run("Preparing destination", || destination.prepare())?;

        if let Some(rev) = &self.last_rev {
            debug!("Resuming after {} (from --last-rev)", rev);
            return Ok(Some(rev.clone()));
        }
        let since = self.workflow.destination.last_migrated()?;
        match &since {
            Some(rev) => debug!("Resuming after {}", rev),
            None => debug!("No bookmark found, listing the whole origin history"),
        }
        Ok(since)
    }

    /// List what the next run would migrate, without migrating anything.
    pub fn info(&mut self) -> Result<MigrationInfo> {
        let last_migrated = self.prepare()?;
        let pending = self
            .workflow
            .origin
            .changes(last_migrated.as_ref(), self.page_size)?
            .collect::<Result<Vec<_>>>()?;

        let info = MigrationInfo {
            workflow: self.workflow.name.clone(),
            origin: self.workflow.origin.describe(),
            destination: self.workflow.destination.describe(),
            last_migrated,
            pending,
        };
        self.events.info_finished(&InfoFinishedEvent { info: &info });
        Ok(info)
    }
}
