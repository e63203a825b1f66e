//! Local git repository operations.
//!
//! Local reads and writes (init, config, history walks, tree materialization,
//! commit creation) go through `git2`. Network operations (fetch, push) shell
//! out to the system `git` command, which automatically handles:
//! - SSH keys from ~/.ssh/
//! - Git credential helpers, including the store configured by
//!   [`crate::credentials`]
//! - Any authentication configured in ~/.gitconfig

use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, TimeZone, Utc};
use git2::{IndexEntry, IndexTime, ObjectType, Oid, Repository, Signature, Sort, TreeWalkMode};
use log::debug;

use crate::change::{split_author, Change, Revision};
use crate::error::{Error, Result};
use crate::filesystem::{File, WorkTree};

const MODE_BLOB: u32 = 0o100644;
const MODE_EXECUTABLE: u32 = 0o100755;

/// A bare repository on local disk.
#[derive(Debug, Clone)]
pub struct BareRepository {
    path: PathBuf,
}

impl BareRepository {
    /// Initialize a new bare repository at `path`.
    pub fn init(path: &Path) -> Result<Self> {
        Repository::init_bare(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Open an existing bare repository.
    pub fn open(path: &Path) -> Result<Self> {
        Repository::open_bare(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// True if `path` holds a repository with a readable `HEAD` reference.
    ///
    /// An unborn branch still counts: a freshly initialized repository has a
    /// symbolic `HEAD` pointing at a branch with no commits yet.
    pub fn is_valid_at(path: &Path) -> bool {
        match Repository::open_bare(path) {
            Ok(repo) => repo.find_reference("HEAD").is_ok(),
            Err(_) => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open_bare(&self.path)?)
    }

    /// Set a configuration value in the repository's local config.
    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        let repo = self.repo()?;
        let mut config = repo.config()?;
        config.set_str(key, value)?;
        Ok(())
    }

    /// Read a configuration value from the repository's local config only.
    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        let config = repo.config()?.open_level(git2::ConfigLevel::Local)?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Run the system `git` against this repository.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let command_line = format!("git {}", args.join(" "));
        debug!("Running {} in {}", command_line, self.path.display());
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&self.path)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| Error::GitCommand {
                command: command_line.clone(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::GitCommand {
                command: command_line,
                stderr: if stderr.is_empty() {
                    "Unknown error".to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Fetch `remote_ref` from `url` into `local_ref`, forcing the update.
    ///
    /// Returns `false` if the remote does not have the ref yet.
    pub fn fetch(&self, url: &str, remote_ref: &str, local_ref: &str) -> Result<bool> {
        let refspec = format!("+{}:{}", remote_ref, local_ref);
        match self.git(&["fetch", "--quiet", "--no-tags", url, &refspec]) {
            Ok(_) => Ok(true),
            Err(Error::GitCommand { stderr, .. })
                if stderr.contains("couldn't find remote ref")
                    || stderr.contains("could not find remote ref") =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Push a local commit to `remote_ref` at `url`.
    pub fn push(&self, url: &str, commit: &str, remote_ref: &str) -> Result<()> {
        let refspec = format!("{}:{}", commit, remote_ref);
        self.git(&["push", "--quiet", url, &refspec]).map(|_| ())
    }

    /// Resolve a ref or revision to a commit id.
    pub fn resolve(&self, spec: &str) -> Result<Option<Revision>> {
        let repo = self.repo()?;
        let resolved = match repo.revparse_single(spec) {
            Ok(object) => object.peel_to_commit()?.id().to_string(),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(Revision::new(resolved)))
    }

    /// Point `refname` at `commit`.
    pub fn update_ref(&self, refname: &str, commit: &Revision) -> Result<()> {
        let repo = self.repo()?;
        let oid = Oid::from_str(commit.as_str())?;
        repo.reference(refname, oid, true, "changeport: update ref")?;
        Ok(())
    }

    /// Revisions on the first-parent line of `head` after `since`, oldest
    /// first. Commits brought in by a merge are represented by the merge.
    pub fn first_parent_history(&self, head: &Revision, since: Option<&Revision>) -> Result<Vec<Revision>> {
        let repo = self.repo()?;
        let mut walk = repo.revwalk()?;
        walk.simplify_first_parent()?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
        walk.push(Oid::from_str(head.as_str())?)?;
        if let Some(since) = since {
            let oid = Oid::from_str(since.as_str()).map_err(|_| Error::Origin {
                message: format!("Invalid bookmark revision: {}", since),
            })?;
            walk.hide(oid).map_err(|e| Error::Origin {
                message: format!("Bookmark {} not found in origin history: {}", since, e),
            })?;
        }

        walk.map(|oid| -> Result<Revision> { Ok(Revision::new(oid?.to_string())) })
            .collect()
    }

    /// Commit metadata of `revisions`, in the given order.
    pub fn changes(&self, origin: &str, revisions: &[Revision]) -> Result<Vec<Change>> {
        let repo = self.repo()?;
        revisions
            .iter()
            .map(|revision| -> Result<Change> {
                let commit = repo.find_commit(Oid::from_str(revision.as_str())?)?;
                Ok(change_from_commit(origin, &commit))
            })
            .collect()
    }

    /// Materialize the tree of `revision` into memory.
    pub fn materialize(&self, revision: &Revision) -> Result<WorkTree> {
        let repo = self.repo()?;
        let commit = repo.find_commit(Oid::from_str(revision.as_str())?)?;
        let tree = commit.tree()?;

        let mut work = WorkTree::new();
        let mut failure: Option<Error> = None;
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return git2::TreeWalkResult::Ok;
            }
            let mode = entry.filemode() as u32;
            if mode != MODE_BLOB && mode != MODE_EXECUTABLE {
                debug!("Skipping non-regular entry {}{:?}", root, entry.name());
                return git2::TreeWalkResult::Ok;
            }
            let name = match entry.name() {
                Some(name) => name,
                None => return git2::TreeWalkResult::Ok,
            };
            let added = repo.find_blob(entry.id()).map_err(Error::from).and_then(|blob| {
                let mut file = File::new(blob.content().to_vec());
                file.executable = mode == MODE_EXECUTABLE;
                work.add_file(format!("{}{}", root, name), file)
            });
            match added {
                Ok(()) => git2::TreeWalkResult::Ok,
                Err(e) => {
                    failure = Some(e);
                    git2::TreeWalkResult::Abort
                }
            }
        })?;

        match failure {
            Some(e) => Err(e),
            None => Ok(work),
        }
    }

    /// Message of the commit `spec` resolves to.
    pub fn commit_message(&self, revision: &Revision) -> Result<String> {
        let repo = self.repo()?;
        let commit = repo.find_commit(Oid::from_str(revision.as_str())?)?;
        Ok(commit.message().unwrap_or_default().to_string())
    }

    /// First parent of a commit, if any.
    pub fn first_parent(&self, revision: &Revision) -> Result<Option<Revision>> {
        let repo = self.repo()?;
        let commit = repo.find_commit(Oid::from_str(revision.as_str())?)?;
        Ok(commit.parent_id(0).ok().map(|oid| Revision::new(oid.to_string())))
    }

    /// Create a commit holding exactly `work`, without touching any ref.
    pub fn commit_tree(
        &self,
        work: &WorkTree,
        parent: Option<&Revision>,
        author: &str,
        timestamp: DateTime<Utc>,
        message: &str,
    ) -> Result<Revision> {
        let repo = self.repo()?;
        let mut index = git2::Index::new()?;
        for (path, file) in work.files() {
            let blob = repo.blob(&file.content)?;
            let path_bytes = path.to_string_lossy().replace('\\', "/").into_bytes();
            index.add(&IndexEntry {
                ctime: IndexTime::new(0, 0),
                mtime: IndexTime::new(0, 0),
                dev: 0,
                ino: 0,
                mode: if file.executable {
                    MODE_EXECUTABLE
                } else {
                    MODE_BLOB
                },
                uid: 0,
                gid: 0,
                file_size: file.content.len() as u32,
                id: blob,
                flags: path_bytes.len().min(0xfff) as u16,
                flags_extended: 0,
                path: path_bytes,
            })?;
        }
        let tree_id = index.write_tree_to(&repo)?;
        let tree = repo.find_tree(tree_id)?;

        let (name, email) = split_author(author);
        let signature = Signature::new(
            name,
            email,
            &git2::Time::new(timestamp.timestamp(), 0),
        )?;
        let parents = match parent {
            Some(rev) => vec![repo.find_commit(Oid::from_str(rev.as_str())?)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let oid = repo.commit(None, &signature, &signature, message, &tree, &parent_refs)?;
        Ok(Revision::new(oid.to_string()))
    }
}

fn change_from_commit(origin: &str, commit: &git2::Commit) -> Change {
    let author = commit.author();
    let author_line = format!(
        "{} <{}>",
        author.name().unwrap_or("unknown"),
        author.email().unwrap_or("")
    );
    let timestamp = Utc
        .timestamp_opt(author.when().seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now);
    Change::new(
        origin,
        Revision::new(commit.id().to_string()),
        author_line,
        timestamp,
        commit.message().unwrap_or_default(),
    )
    .with_previous(commit.parent_id(0).ok().map(|id| Revision::new(id.to_string())))
}
