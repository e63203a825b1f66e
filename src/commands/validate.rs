//! # Validate Command Implementation
//!
//! Checks a workflow file without running it:
//!
//! - **Parsing**: the file must deserialize into a workflow definition.
//! - **Resolution**: origin, destination and every transformation step are
//!   built, so bad globs, bad regexes and missing review settings surface
//!   here rather than in the middle of a run.
//! - **Warnings**: conditions that do not prevent a run but probably are not
//!   what the user wants, such as a missing origin folder.
//!
//! This command is read-only.

use std::env;

use anyhow::Result;
use clap::Args;

use changeport::config::{OriginConfig, WorkflowConfig, WorkflowMode};
use changeport::migration::Workflow;
use changeport::options::MigrationOptions;
use changeport::output::{emoji, OutputConfig};
use changeport::review::{PASSWORD_ENV, USER_ENV};
use changeport::transform::Pipeline;

use super::WorkflowArgs;

/// Validate a workflow file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub workflow: WorkflowArgs,

    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, color_flag: &str) -> Result<()> {
    let out = OutputConfig::from_env_and_flag(color_flag);
    println!(
        "{} Validating workflow: {}",
        emoji(&out, "🔍", "[SCAN]"),
        args.workflow.config.display()
    );

    let config = match args.workflow.load() {
        Ok(config) => {
            println!("{} Workflow file parsed successfully", emoji(&out, "✅", "[OK]"));
            config
        }
        Err(e) => {
            println!("{} Workflow parsing failed", emoji(&out, "❌", "[ERR]"));
            return Err(e);
        }
    };

    let options = args.workflow.options();
    if let Err(e) = Workflow::from_config(&config, &options) {
        println!("{} Workflow cannot be resolved: {}", emoji(&out, "❌", "[ERR]"), e);
        return Err(anyhow::anyhow!("Workflow validation failed"));
    }

    println!("\n{} Workflow Summary:", emoji(&out, "📊", "[INFO]"));
    println!("   Name: {}", config.name);
    println!("   Mode: {}", describe_mode(config.mode));
    println!("   Empty diff policy: {}", config.empty_diff);
    let pipeline = Pipeline::from_config(&config.transformations)?;
    println!("   Transformations: {}", pipeline.len());
    for name in pipeline.step_names() {
        println!("     • {}", name);
    }

    let warnings = collect_warnings(&config, &options);
    for warning in &warnings {
        println!("{} {}", emoji(&out, "⚠️", "[WARN]"), warning);
    }

    println!("\n{} Validation Result:", emoji(&out, "🎯", "[RESULT]"));
    if !warnings.is_empty() && args.strict {
        println!(
            "{} Workflow has warnings (strict mode enabled)",
            emoji(&out, "❌", "[ERR]")
        );
        return Err(anyhow::anyhow!("Workflow validation failed in strict mode"));
    }
    if warnings.is_empty() {
        println!("{} Workflow is valid", emoji(&out, "✅", "[OK]"));
    } else {
        println!("{} Workflow is valid but has warnings", emoji(&out, "⚠️", "[WARN]"));
    }
    Ok(())
}

fn describe_mode(mode: WorkflowMode) -> &'static str {
    match mode {
        WorkflowMode::Single => "single (one change per run)",
        WorkflowMode::Batch => "batch (every pending change)",
    }
}

fn collect_warnings(config: &WorkflowConfig, options: &MigrationOptions) -> Vec<String> {
    let mut warnings = Vec::new();

    if let OriginConfig::Folder(folder) = &config.origin {
        let path = options.resolve_path(&folder.path);
        if !path.is_dir() {
            warnings.push(format!("Origin folder {} does not exist", path.display()));
        }
    }

    if config.review.is_some() && (env::var_os(USER_ENV).is_none() || env::var_os(PASSWORD_ENV).is_none()) {
        warnings.push(format!(
            "Review lookups will be anonymous; set {} and {} to authenticate",
            USER_ENV, PASSWORD_ENV
        ));
    }

    warnings
}
