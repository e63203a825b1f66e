//! In-memory working tree used to carry change content through the engine.
//!
//! Origins materialize a change into a [`WorkTree`], transformations edit it
//! in place, and destinations write it out. Paths are relative and kept in
//! sorted order, so two trees with the same files compare equal and hash to
//! the same digest.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::defaults;
use crate::error::{Error, Result};

/// Lowercase hex encoding of `bytes`.
pub fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// A file's content and the only metadata version control tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// File content as bytes
    pub content: Vec<u8>,
    pub executable: bool,
}

impl File {
    /// Create a new non-executable file with content
    pub fn new(content: Vec<u8>) -> Self {
        Self {
            content,
            executable: false,
        }
    }

    /// Create a new file from string content
    pub fn from_string(content: &str) -> Self {
        Self::new(content.as_bytes().to_vec())
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }

    /// Unix permission bits matching the executable flag.
    pub fn mode(&self) -> u32 {
        if self.executable {
            0o755
        } else {
            0o644
        }
    }
}

/// In-memory snapshot of a change's files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkTree {
    files: BTreeMap<PathBuf, File>,
}

impl WorkTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every regular file under `dir`, skipping `.git`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut tree = Self::new();
        let walker = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.file_name() != ".git"
                    && !(e.depth() == 1 && e.file_name() == defaults::FOLDER_BOOKMARK_FILE)
            });
        for entry in walker {
            let entry = entry.map_err(|e| Error::Filesystem {
                message: format!("Failed to walk '{}': {}", dir.display(), e),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| Error::Filesystem {
                    message: e.to_string(),
                })?
                .to_path_buf();
            let content = fs::read(entry.path())?;
            let mut file = File::new(content);
            file.executable = is_executable(&entry.metadata().map_err(|e| Error::Filesystem {
                message: e.to_string(),
            })?);
            tree.add_file(relative, file)?;
        }
        Ok(tree)
    }

    /// Make `dir` contain exactly this tree. `.git` and a folder bookmark
    /// are left untouched.
    pub fn write_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| Error::Filesystem {
            message: format!("Failed to create directory '{}': {}", dir.display(), e),
        })?;

        let existing = Self::load_dir(dir)?;
        for stale in existing.files.keys().filter(|p| !self.files.contains_key(*p)) {
            fs::remove_file(dir.join(stale)).map_err(|e| Error::Filesystem {
                message: format!("Failed to remove '{}': {}", stale.display(), e),
            })?;
        }

        for (relative_path, file) in &self.files {
            let full_path = dir.join(relative_path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
                    message: format!("Failed to create directory '{}': {}", parent.display(), e),
                })?;
            }
            fs::write(&full_path, &file.content).map_err(|e| Error::Filesystem {
                message: format!("Failed to write file '{}': {}", full_path.display(), e),
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&full_path, fs::Permissions::from_mode(file.mode())).map_err(
                    |e| Error::Filesystem {
                        message: format!(
                            "Failed to set permissions on '{}': {}",
                            full_path.display(),
                            e
                        ),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Add or update a file. Absolute paths and `..` components are rejected.
    pub fn add_file<P: AsRef<Path>>(&mut self, path: P, file: File) -> Result<()> {
        let path = path.as_ref();
        let escapes = path.is_absolute()
            || path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || path.as_os_str().is_empty() {
            return Err(Error::Filesystem {
                message: format!("Invalid tree path: {}", path.display()),
            });
        }
        self.files.insert(path.to_path_buf(), file);
        Ok(())
    }

    /// Add a file with string content
    pub fn add_file_string<P: AsRef<Path>>(&mut self, path: P, content: &str) -> Result<()> {
        self.add_file(path, File::from_string(content))
    }

    pub fn get_file<P: AsRef<Path>>(&self, path: P) -> Option<&File> {
        self.files.get(path.as_ref())
    }

    pub fn get_file_mut<P: AsRef<Path>>(&mut self, path: P) -> Option<&mut File> {
        self.files.get_mut(path.as_ref())
    }

    pub fn remove_file<P: AsRef<Path>>(&mut self, path: P) -> Option<File> {
        self.files.remove(path.as_ref())
    }

    pub fn exists<P: AsRef<Path>>(&self, path: P) -> bool {
        self.files.contains_key(path.as_ref())
    }

    /// List all files, in sorted order
    pub fn list_files(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// List files matching a glob pattern
    pub fn list_files_glob(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        let pattern = Pattern::new(pattern)?;
        Ok(self
            .files
            .keys()
            .filter(|path| path.to_str().is_some_and(|s| pattern.matches(s)))
            .cloned()
            .collect())
    }

    /// Rename a file. Fails if the source is missing or the target exists.
    pub fn rename_file<P: AsRef<Path>, Q: AsRef<Path>>(&mut self, from: P, to: Q) -> Result<()> {
        let from_path = from.as_ref();
        let to_path = to.as_ref();
        if self.files.contains_key(to_path) {
            return Err(Error::Filesystem {
                message: format!(
                    "Cannot move '{}': '{}' already exists",
                    from_path.display(),
                    to_path.display()
                ),
            });
        }
        let file = self.files.remove(from_path).ok_or_else(|| Error::Filesystem {
            message: format!("File not found: {}", from_path.display()),
        })?;
        self.add_file(to_path, file)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over all files as (path, file) pairs, in sorted order
    pub fn files(&self) -> impl Iterator<Item = (&PathBuf, &File)> {
        self.files.iter()
    }

    /// SHA-256 over paths, modes and contents, as lowercase hex.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, file) in &self.files {
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0]);
            hasher.update(file.mode().to_be_bytes());
            hasher.update((file.content.len() as u64).to_be_bytes());
            hasher.update(&file.content);
        }
        to_hex(&hasher.finalize())
    }

    /// Paths that differ between `self` and `other` (added, removed or modified).
    pub fn changed_paths(&self, other: &WorkTree) -> Vec<PathBuf> {
        let mut changed: Vec<PathBuf> = self
            .files
            .iter()
            .filter(|(path, file)| other.files.get(*path) != Some(*file))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            other
                .files
                .keys()
                .filter(|path| !self.files.contains_key(*path))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}
