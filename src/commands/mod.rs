//! # CLI Command Implementations
//!
//! One module per subcommand of the `changeport` tool. Each module has an
//! `Args` struct derived with `clap` and an `execute` function that calls
//! into the `changeport` library.
//!
//! Commands that operate on a workflow share [`WorkflowArgs`]: the workflow
//! file plus the runtime options the migration engine consumes.

pub mod cache;
pub mod info;
pub mod migrate;
pub mod validate;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use changeport::change::Revision;
use changeport::config::{self, WorkflowConfig};
use changeport::credentials::CredentialConfig;
use changeport::defaults;
use changeport::options::{FailurePolicy, MigrationOptions};
use changeport::retry::RetryPolicy;
use changeport::suggestions;

/// Workflow file and runtime options
#[derive(Args, Debug, Clone)]
pub struct WorkflowArgs {
    /// Path to the workflow file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "CHANGEPORT_CONFIG",
        default_value = defaults::CONFIG_FILE_NAME
    )]
    pub config: PathBuf,

    /// The root directory for the repository cache.
    ///
    /// Defaults to the system cache directory (`~/.cache/changeport` on
    /// Linux, `~/Library/Caches/changeport` on macOS).
    #[arg(long, value_name = "DIR", env = "CHANGEPORT_CACHE")]
    pub cache_root: Option<PathBuf>,

    /// Directory relative folder paths are resolved against.
    ///
    /// Defaults to the directory holding the workflow file.
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Attempts per network operation, including the first one.
    #[arg(long, value_name = "N", default_value_t = defaults::RETRY_ATTEMPTS)]
    pub retries: u32,

    /// Delay before the first retry, doubled on every further attempt.
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub retry_delay_ms: u64,

    /// Changes requested per origin query.
    #[arg(long, value_name = "N", default_value_t = defaults::PAGE_SIZE)]
    pub page_size: usize,

    /// Credential file used by git's `store` helper in new cached repositories.
    #[arg(long, value_name = "FILE", conflicts_with = "nogit_credential_helper_store")]
    pub git_credential_helper_store_file: Option<PathBuf>,

    /// Do not configure a credential helper in new cached repositories.
    #[arg(long)]
    pub nogit_credential_helper_store: bool,

    /// What to do after a change fails: fail-fast or best-effort.
    #[arg(long, value_name = "POLICY", default_value = "fail-fast")]
    pub failure_policy: FailurePolicy,

    /// Migrate changes after this origin revision, ignoring the destination's bookmark.
    #[arg(long, value_name = "REV")]
    pub last_rev: Option<String>,
}

impl WorkflowArgs {
    /// Read and parse the workflow file.
    pub fn load(&self) -> Result<WorkflowConfig> {
        if !self.config.exists() {
            return Err(suggestions::config_not_found(&self.config));
        }
        config::from_file(&self.config).map_err(|e| suggestions::workflow_error(&self.config, e))
    }

    pub fn options(&self) -> MigrationOptions {
        let credentials = if self.nogit_credential_helper_store {
            CredentialConfig::Disabled
        } else {
            match &self.git_credential_helper_store_file {
                Some(file) => CredentialConfig::store_file(file),
                None => CredentialConfig::default(),
            }
        };

        let work_dir = self.work_dir.clone().unwrap_or_else(|| {
            match self.config.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            }
        });

        MigrationOptions {
            work_dir,
            cache_root: self
                .cache_root
                .clone()
                .unwrap_or_else(defaults::default_cache_root),
            retry: RetryPolicy::new(self.retries, Duration::from_millis(self.retry_delay_ms)),
            page_size: self.page_size,
            credentials,
            failure_policy: self.failure_policy,
            last_rev: self.last_rev.as_deref().map(Revision::new),
        }
    }
}
