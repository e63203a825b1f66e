//! Lifecycle events and their observers.
//!
//! Events are delivered synchronously, in a fixed well-nested order:
//!
//! ```text
//! MigrationStarted
//!   ChangeMigrationStarted  ChangeMigrationFinished   (once per change)
//!   ...
//! MigrationFinished
//! ```
//!
//! `InfoFinished` is emitted on its own by info queries. A failing observer
//! is isolated by [`EventDispatcher`]: the failure is recorded and logged, and
//! delivery to the remaining observers continues.

use std::panic::{self, AssertUnwindSafe};

use log::{debug, info, warn};

use crate::change::Revision;
use crate::effects::{DestinationEffect, EffectCounts};
use crate::error::{Error, Result};
use crate::migration::{ExitStatus, MigrationInfo, MigrationState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStartedEvent {
    pub workflow: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMigrationStartedEvent {
    pub revision: Revision,
    pub summary: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeMigrationFinishedEvent<'a> {
    pub revision: &'a Revision,
    /// Terminal state of the change: `Done`, `Skipped` or `Failed`.
    pub state: MigrationState,
    pub effects: &'a [DestinationEffect],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationFinishedEvent<'a> {
    pub exit_status: ExitStatus,
    /// Every effect of the run, in commit order.
    pub effects: &'a [DestinationEffect],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoFinishedEvent<'a> {
    pub info: &'a MigrationInfo,
}

/// Observer of migration lifecycle events.
///
/// Every hook defaults to a no-op, so observers implement only what they
/// care about.
pub trait EventMonitor {
    /// Name used when reporting a failure of this monitor.
    fn name(&self) -> &str;

    fn on_migration_started(&self, _event: &MigrationStartedEvent) -> Result<()> {
        Ok(())
    }

    fn on_change_migration_started(&self, _event: &ChangeMigrationStartedEvent) -> Result<()> {
        Ok(())
    }

    fn on_change_migration_finished(&self, _event: &ChangeMigrationFinishedEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_migration_finished(&self, _event: &MigrationFinishedEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_info_finished(&self, _event: &InfoFinishedEvent<'_>) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    InChange,
    Finished,
}

/// Broadcasts events to registered monitors and enforces event nesting.
pub struct EventDispatcher {
    monitors: Vec<Box<dyn EventMonitor>>,
    phase: Phase,
    failures: Vec<Error>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            monitors: Vec::new(),
            phase: Phase::Idle,
            failures: Vec::new(),
        }
    }

    pub fn register(&mut self, monitor: Box<dyn EventMonitor>) {
        debug!("Registered event monitor '{}'", monitor.name());
        self.monitors.push(monitor);
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Observer failures recorded so far.
    pub fn failures(&self) -> &[Error] {
        &self.failures
    }

    /// Reset the nesting guard so the dispatcher can serve another run.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    pub fn migration_started(&mut self, event: &MigrationStartedEvent) {
        self.expect_phase(Phase::Idle, "MigrationStarted");
        self.phase = Phase::Running;
        self.broadcast("MigrationStarted", |m| m.on_migration_started(event));
    }

    pub fn change_migration_started(&mut self, event: &ChangeMigrationStartedEvent) {
        self.expect_phase(Phase::Running, "ChangeMigrationStarted");
        self.phase = Phase::InChange;
        self.broadcast("ChangeMigrationStarted", |m| m.on_change_migration_started(event));
    }

    pub fn change_migration_finished(&mut self, event: &ChangeMigrationFinishedEvent<'_>) {
        self.expect_phase(Phase::InChange, "ChangeMigrationFinished");
        self.phase = Phase::Running;
        self.broadcast("ChangeMigrationFinished", |m| m.on_change_migration_finished(event));
    }

    pub fn migration_finished(&mut self, event: &MigrationFinishedEvent<'_>) {
        self.expect_phase(Phase::Running, "MigrationFinished");
        self.phase = Phase::Finished;
        self.broadcast("MigrationFinished", |m| m.on_migration_finished(event));
    }

    pub fn info_finished(&mut self, event: &InfoFinishedEvent<'_>) {
        self.broadcast("InfoFinished", |m| m.on_info_finished(event));
    }

    fn expect_phase(&self, expected: Phase, event: &str) {
        debug_assert_eq!(self.phase, expected, "{} delivered out of order", event);
        if self.phase != expected {
            warn!(
                "{} delivered out of order (dispatcher is {:?}, expected {:?})",
                event, self.phase, expected
            );
        }
    }

    fn broadcast<F>(&mut self, event: &str, deliver: F)
    where
        F: Fn(&dyn EventMonitor) -> Result<()>,
    {
        for monitor in &self.monitors {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| deliver(monitor.as_ref())));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => panic_message(payload.as_ref()),
            };
            warn!("Event monitor '{}' failed on {}: {}", monitor.name(), event, message);
            self.failures.push(Error::Monitor {
                monitor: monitor.name().to_string(),
                event: event.to_string(),
                message,
            });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

/// Reports lifecycle events through the `log` facade.
#[derive(Debug, Default)]
pub struct LoggingMonitor;

impl EventMonitor for LoggingMonitor {
    fn name(&self) -> &str {
        "logging"
    }

    fn on_migration_started(&self, event: &MigrationStartedEvent) -> Result<()> {
        info!("Migration of workflow '{}' started", event.workflow);
        Ok(())
    }

    fn on_change_migration_started(&self, event: &ChangeMigrationStartedEvent) -> Result<()> {
        info!("Migrating {} {}", event.revision.short(), event.summary);
        Ok(())
    }

    fn on_change_migration_finished(&self, event: &ChangeMigrationFinishedEvent<'_>) -> Result<()> {
        for effect in event.effects {
            match &effect.destination_ref {
                Some(dest) => info!("{} {}: {} ({})", effect.kind, event.revision.short(), effect.summary, dest),
                None => info!("{} {}: {}", effect.kind, event.revision.short(), effect.summary),
            }
        }
        Ok(())
    }

    fn on_migration_finished(&self, event: &MigrationFinishedEvent<'_>) -> Result<()> {
        let counts = EffectCounts::of(event.effects);
        info!(
            "Migration finished with {}: {} created, {} updated, {} no-op, {} failed",
            event.exit_status, counts.created, counts.updated, counts.noop, counts.error
        );
        Ok(())
    }

    fn on_info_finished(&self, event: &InfoFinishedEvent<'_>) -> Result<()> {
        info!(
            "Workflow '{}': {} pending change(s)",
            event.info.workflow,
            event.info.pending.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        name: String,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl EventMonitor for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_migration_started(&self, _event: &MigrationStartedEvent) -> Result<()> {
            self.seen.lock().unwrap().push(format!("{}:start", self.name));
            Ok(())
        }

        fn on_migration_finished(&self, event: &MigrationFinishedEvent<'_>) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:finish:{}", self.name, event.exit_status));
            Ok(())
        }
    }

    struct Failing;

    impl EventMonitor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_migration_started(&self, _event: &MigrationStartedEvent) -> Result<()> {
            Err(Error::Validation {
                message: "observer broke".to_string(),
            })
        }

        fn on_migration_finished(&self, _event: &MigrationFinishedEvent<'_>) -> Result<()> {
            panic!("observer panicked");
        }
    }

    #[test]
    fn test_failing_monitor_is_isolated() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(Failing));
        dispatcher.register(Box::new(Recorder {
            name: "rec".to_string(),
            seen: Arc::clone(&seen),
        }));

        dispatcher.migration_started(&MigrationStartedEvent {
            workflow: "default".to_string(),
        });
        dispatcher.migration_finished(&MigrationFinishedEvent {
            exit_status: ExitStatus::Success,
            effects: &[],
        });

        assert_eq!(*seen.lock().unwrap(), vec!["rec:start", "rec:finish:SUCCESS"]);
        assert_eq!(dispatcher.failures().len(), 2);
        assert!(dispatcher.failures()[0].to_string().contains("observer broke"));
        assert!(dispatcher.failures()[1].to_string().contains("observer panicked"));
    }

    #[test]
    fn test_monitors_receive_events_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = EventDispatcher::new();
        for name in ["a", "b"] {
            dispatcher.register(Box::new(Recorder {
                name: name.to_string(),
                seen: Arc::clone(&seen),
            }));
        }
        dispatcher.migration_started(&MigrationStartedEvent {
            workflow: "w".to_string(),
        });
        assert_eq!(*seen.lock().unwrap(), vec!["a:start", "b:start"]);
    }

    #[test]
    fn test_default_hooks_are_noops() {
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(Box::new(LoggingMonitor));
        dispatcher.migration_started(&MigrationStartedEvent {
            workflow: "w".to_string(),
        });
        dispatcher.change_migration_started(&ChangeMigrationStartedEvent {
            revision: Revision::new("abc"),
            summary: "Add file".to_string(),
        });
        dispatcher.change_migration_finished(&ChangeMigrationFinishedEvent {
            revision: &Revision::new("abc"),
            state: MigrationState::Done,
            effects: &[],
        });
        dispatcher.migration_finished(&MigrationFinishedEvent {
            exit_status: ExitStatus::NoOp,
            effects: &[],
        });
        assert!(dispatcher.failures().is_empty());
    }
}
