//! Credential configuration for cached repositories.
//!
//! Applied exactly once, when [`crate::cache::RepositoryCache`] creates a
//! repository. Existing repositories are never reconfigured.

use std::path::PathBuf;

use log::debug;

use crate::error::{Error, Result};
use crate::git::BareRepository;

/// Git configuration key holding the credential helper.
pub const HELPER_KEY: &str = "credential.helper";

/// How a cached repository obtains authentication material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialConfig {
    /// Leave the repository's credential configuration untouched.
    Disabled,
    /// Use git's persistent `store` helper, optionally with an explicit file.
    Store { file: Option<PathBuf> },
}

impl Default for CredentialConfig {
    fn default() -> Self {
        CredentialConfig::Store { file: None }
    }
}

impl CredentialConfig {
    pub fn store_file(path: impl Into<PathBuf>) -> Self {
        CredentialConfig::Store {
            file: Some(path.into()),
        }
    }

    /// The `credential.helper` value to write, or `None` when disabled.
    ///
    /// Git hands the helper line to a shell, so the store path is single
    /// quoted.
    pub fn helper_value(&self) -> Option<String> {
        match self {
            CredentialConfig::Disabled => None,
            CredentialConfig::Store { file: None } => Some("store".to_string()),
            CredentialConfig::Store { file: Some(path) } => Some(format!(
                "{}{}",
                STORE_FILE_PREFIX,
                shell_quote(&path.to_string_lossy())
            )),
        }
    }
}

const STORE_FILE_PREFIX: &str = "store --file=";

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Inverse of [`shell_quote`]; unquoted values are returned as they are.
fn shell_unquote(value: &str) -> String {
    match value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')) {
        Some(inner) => inner.replace(r"'\''", "'"),
        None => value.to_string(),
    }
}

/// Configure `repo` according to `config`.
///
/// Disabled configurations perform no write at all. A failed write is a
/// [`Error::Config`] and must abort the repository's creation.
pub fn configure(repo: &BareRepository, config: &CredentialConfig) -> Result<()> {
    let value = match config.helper_value() {
        Some(value) => value,
        None => {
            debug!("Credential helper disabled for {}", repo.path().display());
            return Ok(());
        }
    };

    repo.set_config(HELPER_KEY, &value).map_err(|e| Error::Config {
        key: HELPER_KEY.to_string(),
        message: e.to_string(),
    })?;
    debug!("Configured {} = {} in {}", HELPER_KEY, value, repo.path().display());
    Ok(())
}

/// The explicit store file configured for `repo`, if any.
pub fn configured_store_file(repo: &BareRepository) -> Result<Option<PathBuf>> {
    Ok(repo
        .get_config(HELPER_KEY)?
        .and_then(|value| {
            value
                .strip_prefix(STORE_FILE_PREFIX)
                .map(|file| PathBuf::from(shell_unquote(file)))
        }))
}
