//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_config(configs::FOLDER_TO_FOLDER);
//!     fixture.command_with_config("validate").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// Workflow files used across tests.
#[allow(dead_code)]
pub mod configs {
    /// Copy `src/` into `out/`, dropping temporary files.
    pub const FOLDER_TO_FOLDER: &str = r#"
name: local
origin:
  folder:
    path: src
destination:
  folder:
    path: out
transformations:
  - exclude:
      name: drop-scratch
      patterns: ["*.tmp"]
  - move:
      name: into-lib
      from: "^(.*)$"
      to: "lib/$1"
"#;

    /// Copy `src/` into `out/`; changes that leave `out/` unchanged are skipped.
    pub const FOLDER_TO_FOLDER_SKIP: &str = r#"
name: local
origin:
  folder:
    path: src
destination:
  folder:
    path: out
empty_diff: skip
transformations:
  - exclude:
      patterns: ["*.tmp"]
"#;

    /// A move step with a regex that does not compile.
    pub const BAD_REGEX: &str = r#"
origin:
  folder:
    path: src
destination:
  folder:
    path: out
transformations:
  - move:
      from: "(unclosed"
      to: "x"
"#;

    /// A misspelled step tag.
    pub const TYPO_STEP: &str = r#"
origin:
  folder:
    path: src
destination:
  folder:
    path: out
transformations:
  - exlude:
      patterns: ["*.tmp"]
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "invalid: yaml: content:";
}

/// A temporary directory holding a workflow file and its folders.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `changeport.yaml` with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("changeport.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("changeport.yaml")
    }

    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command running in this fixture's directory with an isolated cache.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("changeport");
        cmd.current_dir(self.path())
            .env_remove("CHANGEPORT_CONFIG")
            .env("CHANGEPORT_CACHE", self.path().join(".cache"))
            .env("NO_COLOR", "1");
        cmd
    }

    /// `changeport <subcommand> --config <fixture config>`.
    pub fn command_with_config(&self, subcommand: &str) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg(subcommand).arg("--config").arg(self.config_path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
