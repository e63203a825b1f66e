//! # Migrate Command Implementation
//!
//! Runs a workflow: every pending change (or the oldest one, in single
//! mode) is moved from the origin to the destination. The process exit code
//! mirrors the run's exit status.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use changeport::error::Result as EngineResult;
use changeport::migration::{ExitStatus, Workflow, WorkflowRunner};
use changeport::monitor::{
    ChangeMigrationFinishedEvent, ChangeMigrationStartedEvent, EventMonitor, LoggingMonitor,
    MigrationFinishedEvent,
};
use changeport::output::{emoji, render_effect, render_status, OutputConfig};
use changeport::suggestions;

use super::WorkflowArgs;

/// Migrate pending changes
#[derive(Args, Debug)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Suppress progress output; events are still logged.
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `migrate` command.
pub fn execute(args: MigrateArgs, color_flag: &str) -> Result<ExitStatus> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = args.workflow.load()?;
    let options = args.workflow.options();
    let workflow = Workflow::from_config(&config, &options)
        .map_err(|e| suggestions::workflow_error(&args.workflow.config, e))?;

    if !args.quiet {
        println!(
            "{} Migrating workflow '{}': {} -> {}",
            emoji(&out, "🚚", "[RUN]"),
            workflow.name,
            workflow.origin.describe(),
            workflow.destination.describe()
        );
    }

    let monitor: Box<dyn EventMonitor> = if args.quiet {
        Box::new(LoggingMonitor)
    } else {
        Box::new(ProgressMonitor::new(out.clone()))
    };
    let mut runner = WorkflowRunner::new(workflow, &options).with_monitor(monitor);
    let run = runner.run();

    if !args.quiet {
        println!("{}", render_status(&out, run.exit_status, &run.effects));
    }
    if let Some(error) = &run.error {
        eprintln!("{} {}", emoji(&out, "❌", "[ERR]"), error);
    }
    Ok(run.exit_status)
}

/// Shows a spinner while a change migrates and prints its effects.
struct ProgressMonitor {
    out: OutputConfig,
    bar: ProgressBar,
}

impl ProgressMonitor {
    fn new(out: OutputConfig) -> Self {
        let bar = if out.use_color {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        Self { out, bar }
    }

    fn print(&self, line: String) {
        if self.bar.is_hidden() {
            println!("{}", line);
        } else {
            self.bar.println(line);
        }
    }
}

impl EventMonitor for ProgressMonitor {
    fn name(&self) -> &str {
        "progress"
    }

    fn on_change_migration_started(&self, event: &ChangeMigrationStartedEvent) -> EngineResult<()> {
        self.bar.enable_steady_tick(Duration::from_millis(100));
        self.bar
            .set_message(format!("{} {}", event.revision.short(), event.summary));
        Ok(())
    }

    fn on_change_migration_finished(&self, event: &ChangeMigrationFinishedEvent<'_>) -> EngineResult<()> {
        for effect in event.effects {
            self.print(render_effect(&self.out, effect));
        }
        self.bar.inc(1);
        Ok(())
    }

    fn on_migration_finished(&self, _event: &MigrationFinishedEvent<'_>) -> EngineResult<()> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::workflow_args;
    use std::fs;
    use tempfile::TempDir;

    fn write_workflow(dir: &TempDir, empty_diff: &str) -> std::path::PathBuf {
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/lib.rs"), "pub fn answer() -> u32 { 42 }\n").unwrap();
        fs::write(dir.path().join("src/notes.tmp"), "scratch").unwrap();
        let config = dir.path().join("changeport.yaml");
        fs::write(
            &config,
            format!(
                "name: local\norigin:\n  folder:\n    path: src\ndestination:\n  folder:\n    path: out\n\
                 transformations:\n  - exclude:\n      patterns: [\"*.tmp\"]\nempty_diff: {}\n",
                empty_diff
            ),
        )
        .unwrap();
        config
    }

    #[test]
    fn test_migrate_folder_workflow() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_workflow(&temp_dir, "fail");
        let args = MigrateArgs {
            workflow: workflow_args(config, temp_dir.path().join("cache")),
            quiet: true,
        };

        let code = execute(args, "never").unwrap();
        assert_eq!(code, ExitStatus::Success);
        assert!(temp_dir.path().join("out/lib.rs").exists());
        assert!(!temp_dir.path().join("out/notes.tmp").exists());
    }

    #[test]
    fn test_rerun_with_unchanged_origin() {
        let temp_dir = TempDir::new().unwrap();
        let config = write_workflow(&temp_dir, "skip");
        let run = |config: &std::path::Path| {
            execute(
                MigrateArgs {
                    workflow: workflow_args(config.to_path_buf(), temp_dir.path().join("cache")),
                    quiet: true,
                },
                "never",
            )
            .unwrap()
        };

        assert_eq!(run(&config), ExitStatus::Success);
        // Nothing changed, so the second change is skipped rather than failed.
        assert_eq!(run(&config), ExitStatus::Success);

        let strict = write_workflow(&temp_dir, "fail");
        assert_eq!(run(&strict), ExitStatus::Error);
    }

    #[test]
    fn test_migrate_missing_config() {
        let temp_dir = TempDir::new().unwrap();
        let args = MigrateArgs {
            workflow: workflow_args(temp_dir.path().join("missing.yaml"), temp_dir.path().join("cache")),
            quiet: true,
        };
        let err = execute(args, "never").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }
}
