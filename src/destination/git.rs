//! A git branch, or a review system fronting one, as destination.
//!
//! Commits are built in a cached bare repository and pushed with the system
//! `git`. Every commit message carries a `<label>: <origin revision>` trailer,
//! which is how [`GitDestination::last_migrated`] finds the resume point.

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::cache::RepositoryCache;
use crate::change::{parse_labels, Change, Revision};
use crate::destination::Destination;
use crate::effects::{DestinationEffect, DestinationRef};
use crate::error::{Error, ErrorClass, Result};
use crate::filesystem::{to_hex, WorkTree};
use crate::git::BareRepository;

const DESTINATION_REF: &str = "refs/changeport/destination";
const CHANGE_ID_LABEL: &str = "Change-Id";

/// Push-for-review settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GerritSettings {
    /// Base URL of the review system, used to build review links.
    pub review_url: String,
    /// Seed for deterministic `Change-Id`s; the workflow name.
    pub workflow: String,
}

#[derive(Debug, Clone)]
pub struct GitDestination {
    url: String,
    branch: String,
    rev_id_label: String,
    gerrit: Option<GerritSettings>,
    cache: RepositoryCache,
    repo: Option<BareRepository>,
    /// Commit the next write builds on.
    tip: Option<Revision>,
}

impl GitDestination {
    pub fn new(
        url: impl Into<String>,
        branch: impl Into<String>,
        rev_id_label: impl Into<String>,
        cache: RepositoryCache,
    ) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            rev_id_label: rev_id_label.into(),
            gerrit: None,
            cache,
            repo: None,
            tip: None,
        }
    }

    pub fn with_gerrit(mut self, settings: GerritSettings) -> Self {
        self.gerrit = Some(settings);
        self
    }

    fn repo(&self) -> Result<&BareRepository> {
        self.repo.as_ref().ok_or_else(|| {
            Error::destination_permanent(format!("Destination {} was not prepared", self.url))
        })
    }

    fn push_ref(&self) -> String {
        match self.gerrit {
            Some(_) => format!("refs/for/{}", self.branch),
            None => format!("refs/heads/{}", self.branch),
        }
    }

    /// `I` followed by 40 hex digits, stable for a workflow and origin revision.
    pub fn change_id(workflow: &str, revision: &Revision) -> String {
        let digest = Sha256::digest(format!("{}\n{}", workflow, revision).as_bytes());
        format!("I{}", &to_hex(&digest)[..40])
    }

    /// Commit message for `change`: the origin message with the trailers
    /// appended to its trailer block.
    pub fn commit_message(&self, change: &Change) -> String {
        let mut trailers = vec![format!("{}: {}", self.rev_id_label, change.revision)];
        if let Some(gerrit) = &self.gerrit {
            trailers.push(format!(
                "{}: {}",
                CHANGE_ID_LABEL,
                Self::change_id(&gerrit.workflow, &change.revision)
            ));
        }

        let body = change.message.trim_end();
        let has_trailer_block = !parse_labels(body).is_empty();
        let separator = if body.is_empty() {
            ""
        } else if has_trailer_block {
            "\n"
        } else {
            "\n\n"
        };
        format!("{}{}{}\n", body, separator, trailers.join("\n"))
    }

    fn push(&self, repo: &BareRepository, commit: &Revision) -> Result<()> {
        let target = self.push_ref();
        repo.push(&self.url, commit.as_str(), &target).map_err(|e| match e {
            Error::GitCommand { ref stderr, .. } => Error::Destination {
                class: if crate::error::looks_transient(stderr) {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                },
                message: format!("Push of {} to {} {} failed: {}", commit.short(), self.url, target, stderr),
            },
            other => other,
        })
    }
}

impl Destination for GitDestination {
    fn describe(&self) -> String {
        match &self.gerrit {
            Some(_) => format!("{} (review for {})", self.url, self.branch),
            None => format!("{} ({})", self.url, self.branch),
        }
    }

    fn prepare(&mut self) -> Result<()> {
        let repo = self.cache.get_or_create(&self.url)?;
        let remote_ref = format!("refs/heads/{}", self.branch);
        let found = repo
            .fetch(&self.url, &remote_ref, DESTINATION_REF)
            .map_err(|e| match e {
                Error::GitCommand { ref stderr, .. } => Error::Destination {
                    class: if crate::error::looks_transient(stderr) {
                        ErrorClass::Transient
                    } else {
                        ErrorClass::Permanent
                    },
                    message: format!("Cannot fetch {} from {}: {}", remote_ref, self.url, stderr),
                },
                other => other,
            })?;
        self.tip = if found { repo.resolve(DESTINATION_REF)? } else { None };
        debug!(
            "Destination {} is at {}",
            self.describe(),
            self.tip.as_ref().map(Revision::short).unwrap_or("<empty>")
        );
        self.repo = Some(repo);
        Ok(())
    }

    fn last_migrated(&self) -> Result<Option<Revision>> {
        let repo = self.repo()?;
        let mut cursor = self.tip.clone();
        while let Some(commit) = cursor {
            let message = repo.commit_message(&commit)?;
            if let Some(rev) = parse_labels(&message).get(&self.rev_id_label) {
                return Ok(Some(Revision::new(rev.clone())));
            }
            cursor = repo.first_parent(&commit)?;
        }
        Ok(None)
    }

    fn baseline(&self) -> Result<Option<WorkTree>> {
        match &self.tip {
            Some(tip) => Ok(Some(self.repo()?.materialize(tip)?)),
            None => Ok(None),
        }
    }

    fn review_id(&self, change: &Change) -> Option<String> {
        self.gerrit
            .as_ref()
            .map(|gerrit| Self::change_id(&gerrit.workflow, &change.revision))
    }

    fn write(&mut self, work: &WorkTree, change: &Change) -> Result<Vec<DestinationEffect>> {
        let repo = self.repo()?.clone();
        let message = self.commit_message(change);
        // Deterministic: a retried write recreates the same commit.
        let commit = repo.commit_tree(
            work,
            self.tip.as_ref(),
            &change.author,
            change.timestamp,
            &message,
        )?;
        self.push(&repo, &commit)?;
        repo.update_ref(DESTINATION_REF, &commit)?;
        self.tip = Some(commit.clone());

        let effect = match &self.gerrit {
            Some(gerrit) => {
                let change_id = Self::change_id(&gerrit.workflow, &change.revision);
                let url = format!("{}/q/{}", gerrit.review_url.trim_end_matches('/'), change_id);
                info!("Pushed {} for review: {}", commit.short(), url);
                DestinationEffect::created(
                    change.revision.clone(),
                    format!("Review {} for {}", change_id, change.summary()),
                    DestinationRef::new(change_id, "review").with_url(url),
                )
            }
            None => {
                info!("Pushed {} to {} {}", commit.short(), self.url, self.branch);
                DestinationEffect::created(
                    change.revision.clone(),
                    format!("Commit {} for {}", commit.short(), change.summary()),
                    DestinationRef::new(commit.as_str(), "commit"),
                )
            }
        };
        Ok(vec![effect])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialConfig;
    use chrono::Utc;
    use tempfile::TempDir;

    fn destination(temp_dir: &TempDir, url: &str) -> GitDestination {
        let cache = RepositoryCache::new(temp_dir.path().join("cache"), CredentialConfig::Disabled);
        GitDestination::new(url, "main", "Changeport-RevId", cache)
    }

    fn change(rev: &str, message: &str) -> Change {
        Change::new("origin", Revision::new(rev), "Dev <dev@example.com>", Utc::now(), message)
    }

    #[test]
    fn test_commit_message_appends_trailer() {
        let temp_dir = TempDir::new().unwrap();
        let dest = destination(&temp_dir, "https://example.com/dest");
        assert_eq!(
            dest.commit_message(&change("abc", "Fix bug\n\nDetails.")),
            "Fix bug\n\nDetails.\n\nChangeport-RevId: abc\n"
        );
        assert_eq!(
            dest.commit_message(&change("abc", "Fix bug\n\nSigned-off-by: Dev")),
            "Fix bug\n\nSigned-off-by: Dev\nChangeport-RevId: abc\n"
        );
    }

    #[test]
    fn test_change_id_is_deterministic() {
        let a = GitDestination::change_id("export", &Revision::new("abc"));
        let b = GitDestination::change_id("export", &Revision::new("abc"));
        let c = GitDestination::change_id("other", &Revision::new("abc"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 41);
        assert!(a.starts_with('I'));
    }

    #[test]
    fn test_gerrit_review_id_and_message() {
        let temp_dir = TempDir::new().unwrap();
        let dest = destination(&temp_dir, "https://example.com/dest").with_gerrit(GerritSettings {
            review_url: "https://review.example.com".to_string(),
            workflow: "export".to_string(),
        });
        let change = change("abc", "Subject");
        let id = dest.review_id(&change).unwrap();
        assert!(dest.commit_message(&change).contains(&format!("Change-Id: {}", id)));
        assert_eq!(dest.push_ref(), "refs/for/main");
    }

    #[test]
    #[cfg_attr(not(feature = "integration-tests"), ignore)]
    fn test_push_and_resume_bookmark() {
        let temp_dir = TempDir::new().unwrap();
        let remote = temp_dir.path().join("remote.git");
        BareRepository::init(&remote).unwrap();
        let url = remote.to_string_lossy().to_string();

        let mut dest = destination(&temp_dir, &url);
        dest.prepare().unwrap();
        assert_eq!(dest.last_migrated().unwrap(), None);
        assert_eq!(dest.baseline().unwrap(), None);

        let mut work = WorkTree::new();
        work.add_file_string("a.txt", "one").unwrap();
        let effects = dest.write(&work, &change("rev-1", "First")).unwrap();
        assert_eq!(effects.len(), 1);

        let mut fresh = destination(&temp_dir, &url);
        fresh.prepare().unwrap();
        assert_eq!(fresh.last_migrated().unwrap(), Some(Revision::new("rev-1")));
        assert_eq!(fresh.baseline().unwrap(), Some(work));
    }
}
