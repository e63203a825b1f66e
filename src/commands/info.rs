//! # Info Command Implementation
//!
//! Shows where the next run of a workflow would resume and which origin
//! changes it would migrate. Nothing is written to the destination.

use anyhow::Result;
use clap::Args;

use changeport::migration::{MigrationInfo, Workflow, WorkflowRunner};
use changeport::monitor::LoggingMonitor;
use changeport::output::{emoji, OutputConfig};
use changeport::suggestions;

use super::WorkflowArgs;

/// Show the last migrated revision and the pending changes
#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,
}

/// Execute the `info` command.
pub fn execute(args: InfoArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    let config = args.workflow.load()?;
    let options = args.workflow.options();
    let workflow = Workflow::from_config(&config, &options)
        .map_err(|e| suggestions::workflow_error(&args.workflow.config, e))?;

    let mut runner = WorkflowRunner::new(workflow, &options).with_monitor(Box::new(LoggingMonitor));
    let info = runner.info()?;
    for line in render_info(&out, &info) {
        println!("{}", line);
    }
    Ok(())
}

fn render_info(out: &OutputConfig, info: &MigrationInfo) -> Vec<String> {
    let mut lines = vec![
        format!("{} Workflow: {}", emoji(out, "📋", "[INFO]"), info.workflow),
        format!("   Origin: {}", info.origin),
        format!("   Destination: {}", info.destination),
        format!(
            "   Last migrated: {}",
            info.last_migrated
                .as_ref()
                .map(|rev| rev.to_string())
                .unwrap_or_else(|| "none".to_string())
        ),
        String::new(),
        format!("Pending changes: {}", info.pending.len()),
    ];
    for change in &info.pending {
        lines.push(format!(
            "  • {} {} ({}, {})",
            change.revision.short(),
            change.summary(),
            change.author,
            change.timestamp.format("%Y-%m-%d %H:%M")
        ));
    }
    lines
}
