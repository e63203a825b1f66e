//! A local directory as destination.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::change::{Change, Revision};
use crate::defaults;
use crate::destination::Destination;
use crate::effects::{DestinationEffect, DestinationRef};
use crate::error::{Error, Result};
use crate::filesystem::WorkTree;

/// Makes a directory hold exactly the content of the last written change.
///
/// The origin revision of that change is kept in
/// [`defaults::FOLDER_BOOKMARK_FILE`] next to the content.
#[derive(Debug, Clone)]
pub struct FolderDestination {
    path: PathBuf,
}

impl FolderDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bookmark_path(&self) -> PathBuf {
        self.path.join(defaults::FOLDER_BOOKMARK_FILE)
    }

    fn record(&self, revision: &Revision) -> Result<()> {
        fs::write(self.bookmark_path(), format!("{}\n", revision)).map_err(|e| {
            Error::destination_permanent(format!(
                "Cannot record revision in '{}': {}",
                self.bookmark_path().display(),
                e
            ))
        })
    }

    fn current(&self) -> Result<Option<WorkTree>> {
        if !self.path.is_dir() {
            return Ok(None);
        }
        let tree = WorkTree::load_dir(&self.path)?;
        Ok(if tree.is_empty() { None } else { Some(tree) })
    }
}

impl Destination for FolderDestination {
    fn describe(&self) -> String {
        format!("folder {}", self.path.display())
    }

    fn prepare(&mut self) -> Result<()> {
        if self.path.exists() && !self.path.is_dir() {
            return Err(Error::destination_permanent(format!(
                "'{}' exists and is not a directory",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn last_migrated(&self) -> Result<Option<Revision>> {
        let content = match fs::read_to_string(self.bookmark_path()) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::destination_permanent(format!(
                    "Cannot read '{}': {}",
                    self.bookmark_path().display(),
                    e
                )))
            }
        };
        let revision = content.trim();
        Ok((!revision.is_empty()).then(|| Revision::new(revision)))
    }

    fn baseline(&self) -> Result<Option<WorkTree>> {
        self.current()
    }

    fn write(&mut self, work: &WorkTree, change: &Change) -> Result<Vec<DestinationEffect>> {
        let previous = self.current()?;
        let dest = DestinationRef::new(self.path.display().to_string(), "directory");

        if previous.as_ref() == Some(work) {
            self.record(&change.revision)?;
            return Ok(vec![DestinationEffect::noop(
                change.revision.clone(),
                "Folder already up to date",
            )]);
        }

        work.write_dir(&self.path)
            .map_err(|e| Error::destination_permanent(e.to_string()))?;
        self.record(&change.revision)?;
        debug!("Wrote {} file(s) to {}", work.len(), self.path.display());

        let summary = format!("{} file(s) written to {}", work.len(), self.path.display());
        Ok(vec![match previous {
            None => DestinationEffect::created(change.revision.clone(), summary, dest),
            Some(_) => DestinationEffect::updated(change.revision.clone(), summary, dest),
        }])
    }
}
