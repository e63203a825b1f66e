//! A git repository as origin.
//!
//! The remote ref is fetched into a repository from the shared
//! [`RepositoryCache`]; history is then listed locally, one page at a time.

use std::collections::VecDeque;

use log::debug;

use crate::cache::RepositoryCache;
use crate::change::{Change, Revision};
use crate::error::{Error, Result};
use crate::filesystem::WorkTree;
use crate::git::BareRepository;
use crate::origin::{ChangeStream, Origin};
use crate::retry::RetryPolicy;

const ORIGIN_REF: &str = "refs/changeport/origin";

#[derive(Debug, Clone)]
pub struct GitOrigin {
    url: String,
    r#ref: String,
    cache: RepositoryCache,
    retry: RetryPolicy,
}

impl GitOrigin {
    pub fn new(url: impl Into<String>, r#ref: impl Into<String>, cache: RepositoryCache, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            r#ref: r#ref.into(),
            cache,
            retry,
        }
    }

    fn remote_ref(&self) -> String {
        if self.r#ref.starts_with("refs/") {
            self.r#ref.clone()
        } else {
            format!("refs/heads/{}", self.r#ref)
        }
    }

    /// Fetch the origin ref and return the local repository and its head.
    fn fetch(&self) -> Result<(BareRepository, Option<Revision>)> {
        let repo = self.cache.get_or_create(&self.url)?;
        let remote_ref = self.remote_ref();
        let found = self
            .retry
            .run(&format!("Fetching {} from {}", remote_ref, self.url), || {
                repo.fetch(&self.url, &remote_ref, ORIGIN_REF)
            })
            .map_err(|e| match e {
                Error::GitCommand { .. } => Error::Origin {
                    message: format!("Cannot fetch {} from {}: {}", remote_ref, self.url, e),
                },
                other => other,
            })?;
        if !found {
            return Err(Error::Origin {
                message: format!("Ref {} does not exist in {}", remote_ref, self.url),
            });
        }
        let head = repo.resolve(ORIGIN_REF)?;
        Ok((repo, head))
    }
}

impl Origin for GitOrigin {
    fn describe(&self) -> String {
        format!("{} ({})", self.url, self.r#ref)
    }

    fn changes(&self, since: Option<&Revision>, page_size: usize) -> Result<ChangeStream<'_>> {
        let (repo, head) = self.fetch()?;
        let head = match head {
            Some(head) => head,
            None => return Ok(Box::new(std::iter::empty())),
        };
        if since == Some(&head) {
            return Ok(Box::new(std::iter::empty()));
        }
        debug!("Listing changes of {} after {:?}", self.url, since.map(Revision::short));
        Ok(Box::new(Pages {
            repo,
            origin: self.url.clone(),
            head,
            since: since.cloned(),
            page_size: page_size.max(1),
            pending: VecDeque::new(),
            listed: false,
            buffer: VecDeque::new(),
            failed: false,
        }))
    }

    fn checkout(&self, change: &Change) -> Result<WorkTree> {
        let repo = self.cache.get_or_create(&self.url)?;
        repo.materialize(&change.revision).map_err(|e| Error::Origin {
            message: format!("Cannot read revision {}: {}", change.revision.short(), e),
        })
    }
}

/// Pages through `since..head`.
///
/// The first-parent line is walked once, on first use; commit metadata is
/// then loaded `page_size` revisions at a time.
struct Pages {
    repo: BareRepository,
    origin: String,
    head: Revision,
    since: Option<Revision>,
    page_size: usize,
    pending: VecDeque<Revision>,
    listed: bool,
    buffer: VecDeque<Change>,
    failed: bool,
}

impl Pages {
    fn load_page(&mut self) -> Result<()> {
        if !self.listed {
            let history = self.repo.first_parent_history(&self.head, self.since.as_ref())?;
            debug!("{} change(s) pending in {}", history.len(), self.origin);
            self.pending = history.into();
            self.listed = true;
        }
        let take = self.page_size.min(self.pending.len());
        let page: Vec<Revision> = self.pending.drain(..take).collect();
        if !page.is_empty() {
            self.buffer.extend(self.repo.changes(&self.origin, &page)?);
        }
        Ok(())
    }
}

impl Iterator for Pages {
    type Item = Result<Change>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.buffer.is_empty() {
            if let Err(e) = self.load_page() {
                self.failed = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}
