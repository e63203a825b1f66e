//! CLI argument parsing and command dispatch

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

#[derive(Parser, Debug)]
#[command(name = "changeport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// When to use colors and emojis: auto, always or never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Log level: error, warn, info, debug or trace (RUST_LOG takes precedence)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate pending changes from the origin to the destination
    Migrate(commands::migrate::MigrateArgs),

    /// Show the last migrated revision and the pending changes
    Info(commands::info::InfoArgs),

    /// Parse and resolve a workflow file without running it
    Validate(commands::validate::ValidateArgs),

    /// Inspect the repository cache
    Cache(commands::cache::CacheArgs),
}

impl Cli {
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Migrate(args) => {
                commands::migrate::execute(args, &self.color).map(ExitCode::from)
            }
            Commands::Info(args) => commands::info::execute(args, &self.color).map(|()| ExitCode::SUCCESS),
            Commands::Validate(args) => {
                commands::validate::execute(args, &self.color).map(|()| ExitCode::SUCCESS)
            }
            Commands::Cache(args) => commands::cache::execute(args).map(|()| ExitCode::SUCCESS),
        }
    }
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A second init (in tests) is harmless.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
