//! # Changeport Library
//!
//! This library moves changes from an origin repository into a destination
//! repository, one change at a time, through a declarative workflow. It backs
//! the `changeport` command-line tool but can also be driven directly.
//!
//! ## Quick Example
//!
//! ```
//! use changeport::change::{Change, Revision};
//! use changeport::config;
//! use changeport::filesystem::WorkTree;
//! use changeport::transform::{Pipeline, Transformation};
//!
//! let workflow = config::parse(
//!     r#"
//! origin:
//!   folder:
//!     path: src
//! destination:
//!   folder:
//!     path: out
//! transformations:
//!   - exclude:
//!       patterns: ["*.tmp"]
//! "#,
//! )
//! .unwrap();
//!
//! let pipeline = Pipeline::from_config(&workflow.transformations).unwrap();
//!
//! let mut work = WorkTree::new();
//! work.add_file_string("README.md", "# Project").unwrap();
//! work.add_file_string("scratch.tmp", "junk").unwrap();
//!
//! let change = Change::new(
//!     "src",
//!     Revision::new("0123456789abcdef"),
//!     "Dev <dev@example.com>",
//!     chrono::Utc::now(),
//!     "Initial import",
//! );
//! pipeline.apply(&mut work, &change).unwrap();
//! assert!(work.exists("README.md"));
//! assert!(!work.exists("scratch.tmp"));
//! ```
//!
//! ## Core Concepts
//!
//! - **Workflow (`config`, `migration::Workflow`)**: one origin, one
//!   destination, an ordered transformation pipeline and the policies that
//!   bind them, read from a `changeport.yaml` file.
//! - **Origins and destinations (`origin`, `destination`)**: where changes
//!   come from and where they land. Git repositories are reached through a
//!   shared on-disk cache (`cache`, `git`, `credentials`).
//! - **Transformations (`transform`)**: steps that rewrite the in-memory
//!   tree of a change (`filesystem`) before it is committed.
//! - **Review state (`review`)**: read-only lookups against a code review
//!   server, used to skip changes whose review is already closed.
//! - **Effects and events (`effects`, `monitor`)**: what each change did to
//!   the destination, and the lifecycle events observers receive.
//!
//! ## Execution Flow
//!
//! `migration::WorkflowRunner` drives a run:
//!
//! 1.  **Prepare**: refresh the destination and find the last migrated
//!     origin revision.
//! 2.  **List**: page through the origin changes after that bookmark,
//!     oldest first.
//! 3.  **Migrate**: move each change through fetch, review check,
//!     transformation, validation and commit (`migration::ChangeMigrator`).
//! 4.  **Report**: aggregate the effects into an exit status.

pub mod cache;
pub mod change;
pub mod config;
pub mod credentials;
pub mod defaults;
pub mod destination;
pub mod effects;
pub mod error;
pub mod filesystem;
pub mod git;
pub mod migration;
pub mod monitor;
pub mod options;
pub mod origin;
pub mod output;
pub mod path;
pub mod retry;
pub mod review;
pub mod suggestions;
pub mod transform;

#[cfg(test)]
mod path_proptest;
