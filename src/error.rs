//! # Error Handling
//!
//! This module defines the centralized error type for `changeport`. It uses
//! the `thiserror` library to build one `Error` enum covering every failure
//! the migration engine can hit, together with a classification that tells
//! the retry layer which failures are worth another attempt.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant corresponds to one category of
//!   the engine's error taxonomy and carries the context needed to report it
//!   (the repository URL, the failing transformation step, the git command and
//!   its stderr, ...).
//!
//! - **`ErrorClass`**: `Transient` errors (network trouble, authentication
//!   hiccups, review-system timeouts) are retried with a bounded budget.
//!   `Permanent` errors are never retried.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Scope of a failure
//!
//! Errors fall into three scopes, which the workflow runner uses to decide
//! what happens next:
//!
//! - Run-fatal errors (`RepoInit`, `Config`, `Cache`, `Cancelled`) abort the
//!   whole run regardless of the failure policy.
//! - Change-scoped errors (`Origin`, `Transform`, `Validation`, `Destination`,
//!   `ReviewLookup`) fail only the change being processed.
//! - Everything else is wrapped infrastructure failure and is treated as
//!   change-scoped when it happens while a change is in flight.

use std::fmt;

use thiserror::Error;

/// Whether retrying an operation that failed with a given error can succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Network, authentication or availability problems.
    Transient,
    /// Anything that would fail the same way again.
    Permanent,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Permanent => write!(f, "permanent"),
        }
    }
}

/// Main error type for changeport operations
#[derive(Error, Debug)]
pub enum Error {
    /// The workflow definition could not be parsed or resolved.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A cached repository could not be created or initialized.
    #[error("Cannot create a cached repository for {url}: {message}")]
    RepoInit { url: String, message: String },

    /// Writing repository configuration failed.
    ///
    /// Raised when the credential helper cannot be configured; authentication
    /// would otherwise break silently later on.
    #[error("Repository configuration error for {key}: {message}")]
    Config { key: String, message: String },

    /// An error occurred with a cache operation.
    #[error("Cache operation error: {message}")]
    Cache { message: String },

    /// An error occurred with a working-tree or on-disk file operation.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// An error occurred while executing a git command.
    #[error("Git command failed: {command} - {stderr}")]
    GitCommand { command: String, stderr: String },

    /// The origin could not list or supply the content of a change.
    #[error("Origin error: {message}")]
    Origin { message: String },

    /// A transformation step failed. Never retried.
    #[error("Transformation '{step}' failed: {message}")]
    Transform { step: String, message: String },

    /// A consistency check on the transformed change failed.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// The destination rejected or could not receive a change.
    #[error("Destination error ({class}): {message}")]
    Destination { class: ErrorClass, message: String },

    /// The review system could not be queried.
    #[error("Review lookup failed for {id} ({class}): {message}")]
    ReviewLookup {
        id: String,
        class: ErrorClass,
        message: String,
    },

    /// An event observer failed while handling an event.
    #[error("Monitor '{monitor}' failed on {event}: {message}")]
    Monitor {
        monitor: String,
        event: String,
        message: String,
    },

    /// The run was cancelled before the next change started.
    #[error("Migration cancelled before processing the next change")]
    Cancelled,

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON parsing error, wrapped from `serde_json::Error`.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// A libgit2 error, wrapped from `git2::Error`.
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    /// An HTTP transport error, wrapped from `reqwest::Error`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Classify this error for the retry layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::Destination { class, .. } | Error::ReviewLookup { class, .. } => *class,
            Error::GitCommand { stderr, .. } if looks_transient(stderr) => ErrorClass::Transient,
            Error::Http(e) if e.is_timeout() || e.is_connect() => ErrorClass::Transient,
            Error::Io(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::TimedOut
                        | std::io::ErrorKind::ConnectionReset
                        | std::io::ErrorKind::ConnectionAborted
                        | std::io::ErrorKind::Interrupted
                ) =>
            {
                ErrorClass::Transient
            }
            _ => ErrorClass::Permanent,
        }
    }

    /// Returns true if retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Returns true if this error must abort the whole run, whatever the
    /// configured failure policy.
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Error::RepoInit { .. }
                | Error::Config { .. }
                | Error::Cache { .. }
                | Error::Cancelled
        )
    }

    /// The name of the failing transformation step, if this is a transform error.
    pub fn failed_step(&self) -> Option<&str> {
        match self {
            Error::Transform { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Build a transient destination error.
    pub fn destination_transient(message: impl Into<String>) -> Self {
        Error::Destination {
            class: ErrorClass::Transient,
            message: message.into(),
        }
    }

    /// Build a permanent destination error.
    pub fn destination_permanent(message: impl Into<String>) -> Self {
        Error::Destination {
            class: ErrorClass::Permanent,
            message: message.into(),
        }
    }
}

/// Heuristic used for git and transport stderr: network and authentication
/// problems are worth a retry, everything else is not.
pub fn looks_transient(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    [
        "could not resolve host",
        "connection refused",
        "connection reset",
        "connection timed out",
        "operation timed out",
        "timed out",
        "temporary failure",
        "early eof",
        "the remote end hung up unexpectedly",
        "http 429",
        "http 502",
        "http 503",
        "http 504",
        "authentication failed",
        "could not read username",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "Missing workflow name".to_string(),
            hint: Some("Add 'name:' at the top level".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("Missing workflow name"));
        assert!(display.contains("hint:"));
        assert!(display.contains("Add 'name:'"));
    }

    #[test]
    fn test_error_display_transform_names_step() {
        let error = Error::Transform {
            step: "scrub_internal".to_string(),
            message: "pattern matched nothing".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("scrub_internal"));
        assert!(display.contains("pattern matched nothing"));
        assert_eq!(error.failed_step(), Some("scrub_internal"));
    }

    #[test]
    fn test_destination_classes() {
        assert!(Error::destination_transient("503").is_transient());
        assert!(!Error::destination_permanent("rejected").is_transient());
    }

    #[test]
    fn test_git_command_classification() {
        let network = Error::GitCommand {
            command: "git fetch".to_string(),
            stderr: "fatal: Could not resolve host: example.com".to_string(),
        };
        assert!(network.is_transient());

        let rejected = Error::GitCommand {
            command: "git push".to_string(),
            stderr: "! [rejected] main -> main (non-fast-forward)".to_string(),
        };
        assert!(!rejected.is_transient());
    }

    #[test]
    fn test_transform_errors_are_never_transient() {
        let error = Error::Transform {
            step: "move".to_string(),
            message: "connection timed out".to_string(),
        };
        assert!(!error.is_transient());
        assert!(!error.is_run_fatal());
    }

    #[test]
    fn test_run_fatal_errors() {
        assert!(Error::RepoInit {
            url: "https://example.com/repo".to_string(),
            message: "read-only filesystem".to_string(),
        }
        .is_run_fatal());
        assert!(Error::Config {
            key: "credential.helper".to_string(),
            message: "locked".to_string(),
        }
        .is_run_fatal());
        assert!(Error::Cancelled.is_run_fatal());
        assert!(!Error::Validation {
            message: "empty".to_string()
        }
        .is_run_fatal());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
        assert!(!error.is_transient());
    }

    #[test]
    fn test_io_timeout_is_transient() {
        let io_error = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
        let error: Error = io_error.into();
        assert!(error.is_transient());
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }

    #[test]
    fn test_review_lookup_display() {
        let error = Error::ReviewLookup {
            id: "I1234".to_string(),
            class: ErrorClass::Transient,
            message: "HTTP 503".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("I1234"));
        assert!(display.contains("transient"));
        assert!(error.is_transient());
    }
}
