//! A local directory as a single-change origin.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::change::{Change, Revision};
use crate::error::{Error, Result};
use crate::filesystem::WorkTree;
use crate::origin::{ChangeStream, Origin};

/// Offers the current content of a directory as one change whose revision is
/// the content digest.
#[derive(Debug, Clone)]
pub struct FolderOrigin {
    path: PathBuf,
    author: String,
    message: String,
}

impl FolderOrigin {
    pub fn new(path: impl Into<PathBuf>, author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            author: author.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<WorkTree> {
        if !self.path.is_dir() {
            return Err(Error::Origin {
                message: format!("Origin folder '{}' does not exist", self.path.display()),
            });
        }
        WorkTree::load_dir(&self.path)
    }
}

impl Origin for FolderOrigin {
    fn describe(&self) -> String {
        format!("folder {}", self.path.display())
    }

    fn changes(&self, since: Option<&Revision>, _page_size: usize) -> Result<ChangeStream<'_>> {
        let revision = Revision::new(self.load()?.digest());
        if since == Some(&revision) {
            return Ok(Box::new(std::iter::empty()));
        }
        let change = Change::new(
            self.describe(),
            revision,
            self.author.clone(),
            Utc::now(),
            self.message.clone(),
        );
        Ok(Box::new(std::iter::once(Ok(change))))
    }

    fn checkout(&self, change: &Change) -> Result<WorkTree> {
        let tree = self.load()?;
        if tree.digest() != change.revision.as_str() {
            return Err(Error::Origin {
                message: format!(
                    "Folder '{}' changed while it was being migrated",
                    self.path.display()
                ),
            });
        }
        Ok(tree)
    }
}
