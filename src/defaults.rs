//! Default values for changeport configuration.
//!
//! This module provides centralized default values used across the engine
//! and the commands, ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Default workflow definition file name.
pub const CONFIG_FILE_NAME: &str = "changeport.yaml";

/// Number of changes requested per origin query.
pub const PAGE_SIZE: usize = 200;

/// Attempts per retried operation, including the first one.
pub const RETRY_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled on every further attempt.
pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound for a single retry delay.
pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Label written into destination commits to record the migrated origin revision.
pub const REV_ID_LABEL: &str = "Changeport-RevId";

/// Branch used by git origins and destinations when none is configured.
pub const BRANCH: &str = "main";

/// Author used for changes whose origin carries no authorship.
pub const AUTHOR: &str = "Changeport <changeport@localhost>";

/// File in a folder destination recording the last migrated origin revision.
/// Never part of a work tree.
pub const FOLDER_BOOKMARK_FILE: &str = ".changeport-revision";

/// Subdirectory of the cache root holding cached git repositories.
pub const GIT_REPOS_DIR: &str = "git_repos";

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/changeport` (XDG Base Directory)
/// - macOS: `~/Library/Caches/changeport`
/// - Windows: `{FOLDERID_LocalAppData}\changeport`
///
/// Falls back to `.changeport-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `CHANGEPORT_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".changeport-cache"))
        .join("changeport")
}
