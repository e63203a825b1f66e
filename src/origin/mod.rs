//! Origins: where changes are read from.

pub mod folder;
pub mod git;

pub use folder::FolderOrigin;
pub use git::GitOrigin;

use crate::change::{Change, Revision};
use crate::error::Result;
use crate::filesystem::WorkTree;

/// Lazy, finite sequence of changes, oldest first.
pub type ChangeStream<'a> = Box<dyn Iterator<Item = Result<Change>> + 'a>;

/// A source of changes.
pub trait Origin {
    /// Human-readable identity, e.g. the repository URL and ref.
    fn describe(&self) -> String;

    /// Changes after `since` (exclusive), oldest first. Without a bookmark the
    /// whole history is listed. Implementations query the underlying system
    /// `page_size` changes at a time.
    fn changes(&self, since: Option<&Revision>, page_size: usize) -> Result<ChangeStream<'_>>;

    /// Content of `change`.
    fn checkout(&self, change: &Change) -> Result<WorkTree>;
}
