//! Transformation steps applied to a change's work tree.
//!
//! Steps are compiled once from [`StepConfig`] when the workflow is built, so
//! bad globs and regexes are reported before any change is touched. At run
//! time every failure surfaces as [`Error::Transform`] naming the step.

use std::path::PathBuf;

use glob::Pattern;
use log::debug;
use regex::Regex;

use crate::change::Change;
use crate::config::StepConfig;
use crate::error::{Error, Result};
use crate::filesystem::WorkTree;
use crate::path::{compile_globs, matches_any, regex_rename};

/// Something that rewrites a work tree for a change.
pub trait Transformation {
    fn name(&self) -> &str;

    /// Rewrite `work` in place. Failures are [`Error::Transform`].
    fn apply(&self, work: &mut WorkTree, change: &Change) -> Result<()>;
}

#[derive(Debug, Clone)]
enum Action {
    Exclude(Vec<Pattern>),
    Include(Vec<Pattern>),
    Move {
        from: Regex,
        to: String,
        ignore_noop: bool,
    },
    Replace {
        before: Regex,
        after: String,
        paths: Vec<Pattern>,
        ignore_noop: bool,
    },
}

/// One compiled step.
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    action: Action,
}

impl Step {
    pub fn compile(config: &StepConfig) -> Result<Self> {
        let name = config.name().to_string();
        let invalid = |e: Error| Error::ConfigParse {
            message: format!("Transformation '{}': {}", name, e),
            hint: Some("Run 'changeport validate' to check your configuration".to_string()),
        };
        let action = match config {
            StepConfig::Exclude(s) => Action::Exclude(compile_globs(&s.patterns).map_err(invalid)?),
            StepConfig::Include(s) => Action::Include(compile_globs(&s.patterns).map_err(invalid)?),
            StepConfig::Move(s) => Action::Move {
                from: Regex::new(&s.from).map_err(|e| invalid(e.into()))?,
                to: s.to.clone(),
                ignore_noop: s.ignore_noop,
            },
            StepConfig::Replace(s) => Action::Replace {
                before: Regex::new(&s.before).map_err(|e| invalid(e.into()))?,
                after: s.after.clone(),
                paths: compile_globs(&s.paths).map_err(invalid)?,
                ignore_noop: s.ignore_noop,
            },
        };
        Ok(Self { name, action })
    }

    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Transform {
            step: self.name.clone(),
            message: message.into(),
        }
    }

    fn exclude(work: &mut WorkTree, patterns: &[Pattern]) -> usize {
        let doomed: Vec<PathBuf> = work
            .list_files()
            .into_iter()
            .filter(|p| patterns.iter().any(|g| g.matches(&p.to_string_lossy())))
            .collect();
        for path in &doomed {
            work.remove_file(path);
        }
        doomed.len()
    }

    fn include(work: &mut WorkTree, patterns: &[Pattern]) -> usize {
        let doomed: Vec<PathBuf> = work
            .list_files()
            .into_iter()
            .filter(|p| !patterns.iter().any(|g| g.matches(&p.to_string_lossy())))
            .collect();
        for path in &doomed {
            work.remove_file(path);
        }
        doomed.len()
    }

    fn relocate(&self, work: &mut WorkTree, from: &Regex, to: &str, ignore_noop: bool) -> Result<()> {
        let mut renames = Vec::new();
        for path in work.list_files() {
            let path_str = path.to_string_lossy().to_string();
            if let Some(new_name) = regex_rename(from, to, &path_str) {
                if new_name.is_empty() {
                    return Err(self.fail(format!("'{}' would be moved to an empty path", path_str)));
                }
                if new_name != path_str {
                    renames.push((path, PathBuf::from(new_name)));
                }
            }
        }

        if renames.is_empty() {
            if ignore_noop {
                return Ok(());
            }
            return Err(self.fail(format!("no file path matches '{}'", from.as_str())));
        }

        // Take every source out first so renames within the batch cannot collide.
        let mut moved = Vec::with_capacity(renames.len());
        for (old, new) in renames {
            if let Some(file) = work.remove_file(&old) {
                moved.push((old, new, file));
            }
        }
        for (old, new, file) in moved {
            if work.exists(&new) {
                return Err(self.fail(format!(
                    "cannot move '{}' to '{}': destination already exists",
                    old.display(),
                    new.display()
                )));
            }
            work.add_file(&new, file).map_err(|e| self.fail(e.to_string()))?;
        }
        Ok(())
    }

    fn replace(
        &self,
        work: &mut WorkTree,
        before: &Regex,
        after: &str,
        paths: &[Pattern],
        ignore_noop: bool,
    ) -> Result<()> {
        let mut replaced = 0;
        for path in work.list_files() {
            if !matches_any(paths, &path.to_string_lossy()) {
                continue;
            }
            let file = match work.get_file_mut(&path) {
                Some(file) => file,
                None => continue,
            };
            let text = match std::str::from_utf8(&file.content) {
                Ok(text) => text,
                Err(_) => {
                    debug!("Step '{}' skips non UTF-8 file {}", self.name, path.display());
                    continue;
                }
            };
            let updated = before.replace_all(text, after);
            if updated != text {
                let updated = updated.into_owned();
                file.content = updated.into_bytes();
                replaced += 1;
            }
        }

        if replaced == 0 && !ignore_noop {
            return Err(self.fail(format!("pattern '{}' matched no content", before.as_str())));
        }
        Ok(())
    }
}

impl Transformation for Step {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, work: &mut WorkTree, _change: &Change) -> Result<()> {
        match &self.action {
            Action::Exclude(patterns) => {
                let removed = Self::exclude(work, patterns);
                debug!("Step '{}' excluded {} file(s)", self.name, removed);
                Ok(())
            }
            Action::Include(patterns) => {
                let removed = Self::include(work, patterns);
                debug!("Step '{}' dropped {} file(s)", self.name, removed);
                Ok(())
            }
            Action::Move {
                from,
                to,
                ignore_noop,
            } => self.relocate(work, from, to, *ignore_noop),
            Action::Replace {
                before,
                after,
                paths,
                ignore_noop,
            } => self.replace(work, before, after, paths, *ignore_noop),
        }
    }
}

/// Steps applied in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    steps: Vec<Step>,
}

impl Pipeline {
    pub fn from_config(steps: &[StepConfig]) -> Result<Self> {
        Ok(Self {
            steps: steps.iter().map(Step::compile).collect::<Result<_>>()?,
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

impl Transformation for Pipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn apply(&self, work: &mut WorkTree, change: &Change) -> Result<()> {
        for step in &self.steps {
            step.apply(work, change).map_err(|e| match e {
                Error::Transform { .. } => e,
                other => step.fail(other.to_string()),
            })?;
        }
        Ok(())
    }
}
