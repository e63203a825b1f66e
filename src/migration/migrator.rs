//! Per-change state machine.

use std::borrow::Cow;

use log::{debug, info, warn};

use crate::change::Change;
use crate::config::{Authoring, EmptyDiffPolicy};
use crate::destination::Destination;
use crate::effects::{DestinationEffect, EffectKind, EffectLog};
use crate::error::{Error, Result};
use crate::migration::validation::{check_empty_diff, Verdict};
use crate::migration::MigrationState;
use crate::monitor::{ChangeMigrationFinishedEvent, ChangeMigrationStartedEvent, EventDispatcher};
use crate::origin::Origin;
use crate::retry::RetryPolicy;
use crate::review::ReviewStateReader;
use crate::transform::Transformation;

/// How one change ended.
#[derive(Debug)]
pub struct ChangeOutcome {
    /// `Done`, `Skipped` or `Failed`.
    pub state: MigrationState,
    pub error: Option<Error>,
    /// True if a fail-fast run must stop because of this failure. Review
    /// lookup failures fail the change without escalating.
    pub escalate: bool,
}

impl ChangeOutcome {
    fn finished(state: MigrationState) -> Self {
        Self {
            state,
            error: None,
            escalate: false,
        }
    }
}

/// Drives one change through fetch, review check, transformation,
/// validation and commit.
pub struct ChangeMigrator<'a> {
    pub origin: &'a dyn Origin,
    pub destination: &'a mut dyn Destination,
    pub transformation: &'a dyn Transformation,
    pub reviews: Option<&'a mut ReviewStateReader>,
    pub retry: RetryPolicy,
    pub empty_diff: EmptyDiffPolicy,
    pub authoring: &'a Authoring,
}

/// Current state of the change being migrated.
struct Progress<'c> {
    change: &'c Change,
    state: MigrationState,
}

impl<'c> Progress<'c> {
    fn advance(&mut self, next: MigrationState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {}",
            self.state,
            next
        );
        debug!("{}: {} -> {}", self.change.revision.short(), self.state, next);
        self.state = next;
    }

    fn skip(mut self, log: &mut EffectLog, reason: String) -> ChangeOutcome {
        info!("Skipping {}: {}", self.change.revision.short(), reason);
        log.record([DestinationEffect::noop(self.change.revision.clone(), reason)]);
        self.advance(MigrationState::Skipped);
        ChangeOutcome::finished(MigrationState::Skipped)
    }

    fn fail(mut self, log: &mut EffectLog, error: Error, escalate: bool) -> ChangeOutcome {
        warn!("Change {} failed: {}", self.change.revision.short(), error);
        log.record([DestinationEffect::error(self.change.revision.clone(), error.to_string())
            .with_failed_step(error.failed_step())]);
        self.advance(MigrationState::Failed);
        ChangeOutcome {
            state: MigrationState::Failed,
            error: Some(error),
            escalate,
        }
    }
}

impl ChangeMigrator<'_> {
    /// Migrate `change`, recording its effects in `log` and emitting one
    /// matched pair of change events.
    pub fn migrate(
        &mut self,
        change: &Change,
        log: &mut EffectLog,
        events: &mut EventDispatcher,
    ) -> ChangeOutcome {
        events.change_migration_started(&ChangeMigrationStartedEvent {
            revision: change.revision.clone(),
            summary: change.summary().to_string(),
        });
        let first_effect = log.len();
        let outcome = self.drive(change, log);
        events.change_migration_finished(&ChangeMigrationFinishedEvent {
            revision: &change.revision,
            state: outcome.state,
            effects: log.since(first_effect),
        });
        outcome
    }

    fn drive(&mut self, change: &Change, log: &mut EffectLog) -> ChangeOutcome {
        let mut progress = Progress {
            change,
            state: MigrationState::Pending,
        };

        let origin = self.origin;
        let checkout = self.retry.run(
            &format!("Fetching {}", change.revision.short()),
            || origin.checkout(change),
        );
        let mut work = match checkout {
            Ok(work) => work,
            Err(e) => return progress.fail(log, e, true),
        };
        progress.advance(MigrationState::Fetched);

        let mut under_review = false;
        let review_id = self.destination.review_id(change);
        if let (Some(reviews), Some(id)) = (self.reviews.as_deref_mut(), review_id) {
            match reviews.fetch(&id) {
                Ok(Some(record)) if record.status.is_closed() => {
                    let reason = format!("Review {} is already {}", id, record.status);
                    return progress.skip(log, reason);
                }
                Ok(Some(_)) => under_review = true,
                Ok(None) => debug!("No review exists yet for {}", id),
                Err(e) => return progress.fail(log, e, false),
            }
        }

        if let Err(e) = self.transformation.apply(&mut work, change) {
            return progress.fail(log, e, true);
        }
        progress.advance(MigrationState::Transformed);

        let verdict: Result<Verdict> = self
            .destination
            .baseline()
            .map(|baseline| check_empty_diff(self.empty_diff, baseline.as_ref(), &work));
        progress.advance(MigrationState::Validated);
        match verdict {
            Ok(Verdict::Proceed) => {}
            Ok(Verdict::Skip(reason)) => return progress.skip(log, reason),
            Ok(Verdict::Fail(message)) => {
                return progress.fail(log, Error::Validation { message }, true)
            }
            Err(e) => return progress.fail(log, e, true),
        }

        let author = self.authoring.resolve(&change.author);
        let authored = if author == change.author {
            Cow::Borrowed(change)
        } else {
            debug!("Writing {} as {}", change.revision.short(), author);
            let mut authored = change.clone();
            authored.author = author.to_string();
            Cow::Owned(authored)
        };

        let destination = &mut *self.destination;
        let written = self.retry.run(
            &format!("Writing {}", change.revision.short()),
            || destination.write(&work, &authored),
        );
        let effects = match written {
            Ok(effects) => effects,
            Err(e) => return progress.fail(log, e, true),
        };
        progress.advance(MigrationState::Committed);

        log.record(effects.into_iter().map(|mut effect| {
            // A change that already has an open review gets a new patch set.
            if under_review && effect.kind == EffectKind::Created {
                effect.kind = EffectKind::Updated;
            }
            effect
        }));
        progress.advance(MigrationState::EffectRecorded);
        progress.advance(MigrationState::Done);
        ChangeOutcome::finished(MigrationState::Done)
    }
}
