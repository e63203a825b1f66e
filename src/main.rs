//! # Changeport CLI
//!
//! Binary entry point for the `changeport` command-line tool.
//!
//! Parses arguments with `clap`, dispatches to a command, and turns the
//! outcome into a process exit code. The migration logic lives in the
//! library crate; this binary is a thin wrapper around it.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    match cli.execute() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
