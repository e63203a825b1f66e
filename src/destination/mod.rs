//! Destinations: where changes are written to.

pub mod folder;
pub mod git;

pub use folder::FolderDestination;
pub use git::GitDestination;

use crate::change::{Change, Revision};
use crate::effects::DestinationEffect;
use crate::error::Result;
use crate::filesystem::WorkTree;

/// A target for migrated changes.
pub trait Destination {
    fn describe(&self) -> String;

    /// Bring local knowledge of the destination up to date. Called once per
    /// run, before the bookmark is read.
    fn prepare(&mut self) -> Result<()>;

    /// Origin revision of the last change migrated here, if recorded.
    fn last_migrated(&self) -> Result<Option<Revision>>;

    /// Content the next write would be compared against, `None` if the
    /// destination is empty.
    fn baseline(&self) -> Result<Option<WorkTree>>;

    /// Id under which the review system tracks `change`, for destinations
    /// that submit through a review system.
    fn review_id(&self, _change: &Change) -> Option<String> {
        None
    }

    /// Write `work` as the migration of `change`.
    ///
    /// Errors are [`crate::error::Error::Destination`] carrying a transient
    /// or permanent class. Writing the same change again after a transient
    /// failure must be safe.
    fn write(&mut self, work: &WorkTree, change: &Change) -> Result<Vec<DestinationEffect>>;
}
