//! Runtime options consumed by the migration engine.
//!
//! These come from command-line flags and the environment; the workflow file
//! itself is described by [`crate::config::WorkflowConfig`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::change::Revision;
use crate::credentials::CredentialConfig;
use crate::defaults;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// What the runner does after a change fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run on the first failed change.
    #[default]
    FailFast,
    /// Record the failure and continue with the next change.
    BestEffort,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "best-effort" => Ok(FailurePolicy::BestEffort),
            other => Err(format!(
                "unknown failure policy '{}' (expected fail-fast or best-effort)",
                other
            )),
        }
    }
}

/// Options for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Directory relative paths in the workflow file are resolved against.
    pub work_dir: PathBuf,
    /// Root of the shared repository cache.
    pub cache_root: PathBuf,
    pub retry: RetryPolicy,
    /// Changes requested per origin query.
    pub page_size: usize,
    pub credentials: CredentialConfig,
    pub failure_policy: FailurePolicy,
    /// Overrides the bookmark reported by the destination.
    pub last_rev: Option<Revision>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            cache_root: defaults::default_cache_root(),
            retry: RetryPolicy::default(),
            page_size: defaults::PAGE_SIZE,
            credentials: CredentialConfig::default(),
            failure_policy: FailurePolicy::default(),
            last_rev: None,
        }
    }
}

impl MigrationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::ConfigParse {
                message: "Page size must be greater than zero".to_string(),
                hint: Some(format!("The default page size is {}", defaults::PAGE_SIZE)),
            });
        }
        Ok(())
    }

    /// Resolve `path` against the working directory.
    pub fn resolve_path(&self, path: &std::path::Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.work_dir.join(path)
        }
    }
}
