//! # Workflow Configuration
//!
//! This module defines the data structures that represent a `changeport.yaml`
//! workflow file, and the logic for parsing and checking it.
//!
//! ## Key Components
//!
//! - **`WorkflowConfig`**: The whole file. It binds one origin, one
//!   destination, an ordered list of transformation steps and the policy
//!   settings of the workflow.
//!
//! - **`OriginConfig`**, **`DestinationConfig`**, **`StepConfig`**: Closed sets
//!   of externally tagged variants. The tag selects the building block (`git`,
//!   `folder`, `move`, ...) and is resolved once, when the workflow is built.
//!
//! ## Example
//!
//! ```yaml
//! name: export
//! origin:
//!   git:
//!     url: https://git.example.com/internal
//!     ref: main
//! destination:
//!   git:
//!     url: https://git.example.com/public
//!     branch: main
//! transformations:
//!   - exclude:
//!       patterns: ["internal/**"]
//!   - move:
//!       name: relocate
//!       from: "^src/(.*)$"
//!       to: "lib/$1"
//! empty_diff: skip
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::change::split_author;
use crate::defaults;
use crate::error::{Error, Result};

/// Git origin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitOriginConfig {
    /// URL of the repository to read changes from.
    pub url: String,
    /// Branch or ref whose history is migrated.
    #[serde(default = "default_branch", rename = "ref")]
    pub r#ref: String,
}

/// Folder origin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolderOriginConfig {
    /// Directory whose content forms the single change.
    pub path: PathBuf,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_folder_message")]
    pub message: String,
}

/// Where changes are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginConfig {
    Git(GitOriginConfig),
    Folder(FolderOriginConfig),
}

/// How a git destination submits changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewMode {
    /// Push for review to `refs/for/<branch>` with a `Change-Id`.
    Gerrit,
}

/// Git destination configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GitDestinationConfig {
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Submit through a review system instead of pushing to the branch.
    #[serde(default)]
    pub review: Option<ReviewMode>,
    /// Label recording the origin revision in destination commit messages.
    #[serde(default = "default_rev_id_label")]
    pub rev_id_label: String,
}

/// Folder destination configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FolderDestinationConfig {
    pub path: PathBuf,
}

/// Where changes are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationConfig {
    Git(GitDestinationConfig),
    Folder(FolderDestinationConfig),
}

/// Review system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Base URL of the review system, e.g. `https://review.example.com`.
    pub url: String,
}

/// Exclude step configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExcludeStep {
    #[serde(default)]
    pub name: Option<String>,
    /// Glob patterns of files to drop.
    pub patterns: Vec<String>,
}

/// Include step configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncludeStep {
    #[serde(default)]
    pub name: Option<String>,
    /// Glob patterns of files to keep; everything else is dropped.
    pub patterns: Vec<String>,
}

/// Move step configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveStep {
    #[serde(default)]
    pub name: Option<String>,
    /// A regular expression matched against file paths.
    pub from: String,
    /// A replacement pattern that can include capture groups from the `from`
    /// regex (e.g., `$1`, `$2`).
    pub to: String,
    /// Do not fail when no file matches.
    #[serde(default)]
    pub ignore_noop: bool,
}

/// Replace step configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplaceStep {
    #[serde(default)]
    pub name: Option<String>,
    /// Regular expression searched in file content.
    pub before: String,
    /// Replacement, with `$1`-style capture references.
    pub after: String,
    /// Limit the replacement to files matching these globs.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Do not fail when nothing was replaced.
    #[serde(default)]
    pub ignore_noop: bool,
}

/// One transformation step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepConfig {
    Exclude(ExcludeStep),
    Include(IncludeStep),
    Move(MoveStep),
    Replace(ReplaceStep),
}

impl StepConfig {
    /// The kind of step, as written in the file.
    pub fn kind(&self) -> &'static str {
        match self {
            StepConfig::Exclude(_) => "exclude",
            StepConfig::Include(_) => "include",
            StepConfig::Move(_) => "move",
            StepConfig::Replace(_) => "replace",
        }
    }

    /// The configured step name, defaulting to the step kind.
    pub fn name(&self) -> &str {
        let explicit = match self {
            StepConfig::Exclude(s) => s.name.as_deref(),
            StepConfig::Include(s) => s.name.as_deref(),
            StepConfig::Move(s) => s.name.as_deref(),
            StepConfig::Replace(s) => s.name.as_deref(),
        };
        explicit.unwrap_or_else(|| self.kind())
    }
}

/// What to do when a transformed change does not modify the destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyDiffPolicy {
    /// Fail the change.
    #[default]
    Fail,
    /// Skip the change with a no-op effect.
    Skip,
    /// Write it anyway.
    Allow,
}

impl fmt::Display for EmptyDiffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyDiffPolicy::Fail => write!(f, "fail"),
            EmptyDiffPolicy::Skip => write!(f, "skip"),
            EmptyDiffPolicy::Allow => write!(f, "allow"),
        }
    }
}

impl FromStr for EmptyDiffPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fail" => Ok(EmptyDiffPolicy::Fail),
            "skip" => Ok(EmptyDiffPolicy::Skip),
            "allow" => Ok(EmptyDiffPolicy::Allow),
            other => Err(format!(
                "unknown empty-diff policy '{}' (expected fail, skip or allow)",
                other
            )),
        }
    }
}

/// Whose name goes on the changes written to the destination.
///
/// ```yaml
/// authoring: pass_thru
/// authoring:
///   overwrite:
///     author: "Bot <bot@example.com>"
/// authoring:
///   allowed:
///     default: "Bot <bot@example.com>"
///     allowlist: ["dev@example.com"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authoring {
    /// Keep the origin author.
    #[default]
    PassThru,
    /// Always use `author`.
    Overwrite { author: String },
    /// Keep origin authors whose email is in `allowlist`, use `default`
    /// for everyone else.
    Allowed {
        default: String,
        #[serde(default)]
        allowlist: Vec<String>,
    },
}

impl Authoring {
    /// The destination author for a change authored by `origin_author`.
    pub fn resolve<'a>(&'a self, origin_author: &'a str) -> &'a str {
        match self {
            Authoring::PassThru => origin_author,
            Authoring::Overwrite { author } => author,
            Authoring::Allowed { default, allowlist } => {
                let (_, email) = split_author(origin_author);
                if allowlist.iter().any(|allowed| allowed.eq_ignore_ascii_case(email)) {
                    origin_author
                } else {
                    default
                }
            }
        }
    }

    fn configured_authors(&self) -> Vec<&str> {
        match self {
            Authoring::PassThru => Vec::new(),
            Authoring::Overwrite { author } => vec![author.as_str()],
            Authoring::Allowed { default, .. } => vec![default.as_str()],
        }
    }
}

/// How many changes one run migrates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Only the oldest pending change.
    Single,
    /// Every pending change.
    #[default]
    Batch,
}

/// A complete workflow file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    #[serde(default = "default_workflow_name")]
    pub name: String,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub origin: OriginConfig,
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub destination: DestinationConfig,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    pub transformations: Vec<StepConfig>,
    #[serde(default)]
    pub empty_diff: EmptyDiffPolicy,
    #[serde(default)]
    pub mode: WorkflowMode,
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub authoring: Authoring,
    #[serde(default)]
    pub review: Option<ReviewConfig>,
}

fn default_branch() -> String {
    defaults::BRANCH.to_string()
}

fn default_author() -> String {
    defaults::AUTHOR.to_string()
}

fn default_folder_message() -> String {
    "Import from folder".to_string()
}

fn default_rev_id_label() -> String {
    defaults::REV_ID_LABEL.to_string()
}

fn default_workflow_name() -> String {
    "default".to_string()
}

/// Parses a YAML string into a `WorkflowConfig` and checks it.
pub fn parse(yaml_content: &str) -> Result<WorkflowConfig> {
    let config: WorkflowConfig =
        serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: Some(
                "Expected top-level keys: name, origin, destination, transformations, \
                 empty_diff, mode, review"
                    .to_string(),
            ),
        })?;
    config.validate()?;
    Ok(config)
}

/// Parse a workflow file from disk.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<WorkflowConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

impl WorkflowConfig {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::ConfigParse {
                message: "Workflow name is empty".to_string(),
                hint: Some("Set 'name:' to a non-empty string".to_string()),
            });
        }

        if let DestinationConfig::Git(git) = &self.destination {
            if git.review.is_some() && self.review.is_none() {
                return Err(Error::ConfigParse {
                    message: "Destination pushes for review but no review system is configured"
                        .to_string(),
                    hint: Some("Add a top-level 'review: { url: ... }' section".to_string()),
                });
            }
            if git.rev_id_label.trim().is_empty() || git.rev_id_label.contains(':') {
                return Err(Error::ConfigParse {
                    message: format!("Invalid rev_id_label '{}'", git.rev_id_label),
                    hint: Some("Use a trailer key such as 'Changeport-RevId'".to_string()),
                });
            }
        }

        for author in self.authoring.configured_authors() {
            if split_author(author).1.is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("Invalid author '{}' in authoring", author),
                    hint: Some("Use the form 'Name <email>'".to_string()),
                });
            }
        }

        for (index, step) in self.transformations.iter().enumerate() {
            let empty = match step {
                StepConfig::Exclude(s) => s.patterns.is_empty(),
                StepConfig::Include(s) => s.patterns.is_empty(),
                StepConfig::Move(s) => s.from.is_empty(),
                StepConfig::Replace(s) => s.before.is_empty(),
            };
            if empty {
                return Err(Error::ConfigParse {
                    message: format!(
                        "Transformation #{} ('{}') has nothing to match",
                        index + 1,
                        step.name()
                    ),
                    hint: None,
                });
            }
        }
        Ok(())
    }
}
