//! End-to-end tests for the `changeport` binary.
//!
//! Exit codes follow the run's exit status:
//!
//! - 0: SUCCESS
//! - 1: ERROR (and any command-level failure)
//! - 2: invalid command-line usage (handled by clap)
//! - 4: NO_OP
//! - 5: PARTIAL_SUCCESS

mod common;

use changeport::filesystem::WorkTree;
use common::prelude::*;

fn folder_fixture() -> TestFixture {
    TestFixture::new()
        .with_config(configs::FOLDER_TO_FOLDER)
        .with_file("src/a.txt", "alpha\n")
        .with_file("src/docs/b.md", "# beta\n")
        .with_file("src/scratch.tmp", "junk")
}

#[test]
fn test_help_lists_commands() {
    cargo_bin_cmd!("changeport")
        .arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn test_version() {
    cargo_bin_cmd!("changeport").arg("--version").assert().code(0);
}

#[test]
fn test_unknown_flag_is_usage_error() {
    cargo_bin_cmd!("changeport")
        .args(["migrate", "--no-such-flag"])
        .assert()
        .code(2);
}

#[test]
fn test_invalid_failure_policy_is_usage_error() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("migrate")
        .args(["--failure-policy", "sometimes"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("fail-fast or best-effort"));
}

#[test]
fn test_validate_success() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("validate")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Workflow is valid"))
        .stdout(predicate::str::contains("into-lib"));
}

#[test]
fn test_validate_missing_config() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .args(["validate", "--config", "nonexistent.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("CHANGEPORT_CONFIG"));
}

#[test]
fn test_config_from_environment() {
    let fixture = folder_fixture();
    fixture
        .command()
        .env("CHANGEPORT_CONFIG", fixture.config_path())
        .arg("validate")
        .assert()
        .code(0);
}

#[test]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);
    fixture.command_with_config("validate").assert().code(1);
}

#[test]
fn test_validate_suggests_step_name() {
    let fixture = TestFixture::new().with_config(configs::TYPO_STEP);
    fixture
        .command_with_config("validate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Did you mean 'exclude'?"));
}

#[test]
fn test_validate_rejects_bad_regex() {
    let fixture = TestFixture::new()
        .with_config(configs::BAD_REGEX)
        .with_file("src/a.txt", "a");
    fixture
        .command_with_config("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("cannot be resolved"));
}

#[test]
fn test_migrate_folder_to_folder() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("migrate")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("CREATED"))
        .stdout(predicate::str::contains("SUCCESS"));

    fixture.child("out/lib/a.txt").assert("alpha\n");
    fixture.child("out/lib/docs/b.md").assert("# beta\n");
    fixture.child("out/lib/scratch.tmp").assert(predicate::path::missing());
}

#[test]
fn test_migrate_nothing_pending_is_noop() {
    let fixture = folder_fixture();
    let digest = WorkTree::load_dir(&fixture.path().join("src")).unwrap().digest();

    fixture
        .command_with_config("migrate")
        .args(["--last-rev", &digest])
        .assert()
        .code(4)
        .stdout(predicate::str::contains("NO_OP"));
    fixture.child("out").assert(predicate::path::missing());
}

#[test]
fn test_migrate_resumes_from_folder_bookmark() {
    let fixture = folder_fixture();
    fixture.command_with_config("migrate").assert().code(0);
    fixture
        .command_with_config("migrate")
        .assert()
        .code(4)
        .stdout(predicate::str::contains("NO_OP"));
    fixture
        .command_with_config("info")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Pending changes: 0"));
}

#[test]
fn test_migrate_rerun_exit_codes() {
    let fixture = folder_fixture();
    fixture.command_with_config("migrate").assert().code(0);

    // Only an excluded file changed: empty diff under the default `fail` policy.
    fixture.child("src/scratch.tmp").write_str("more junk").unwrap();
    fixture.command_with_config("migrate").assert().code(1);
    fixture
        .command_with_config("migrate")
        .args(["--failure-policy", "best-effort"])
        .assert()
        .code(5)
        .stdout(predicate::str::contains("PARTIAL_SUCCESS"));
}

#[test]
fn test_migrate_rerun_with_skip_policy() {
    let fixture = TestFixture::new()
        .with_config(configs::FOLDER_TO_FOLDER_SKIP)
        .with_file("src/a.txt", "alpha\n");
    fixture.command_with_config("migrate").assert().code(0);
    fixture.child("src/scratch.tmp").write_str("junk").unwrap();
    fixture
        .command_with_config("migrate")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("NOOP"));
}

#[test]
fn test_migrate_quiet() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("migrate")
        .arg("--quiet")
        .assert()
        .code(0)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_info_lists_pending_change() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("info")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Workflow: local"))
        .stdout(predicate::str::contains("Pending changes: 1"));
    fixture.child("out").assert(predicate::path::missing());
}

#[test]
fn test_cache_path() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .args(["cache", "path", "https://Example.com/org/repo.git"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("git_repos"))
        .stdout(predicate::str::contains("example.com-org-repo.git-"));
}

#[test]
fn test_cache_list_empty() {
    let fixture = TestFixture::new();
    fixture
        .command()
        .args(["cache", "list", "--json"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_plain_output_without_color() {
    let fixture = folder_fixture();
    fixture
        .command_with_config("validate")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("[OK]"))
        .stdout(predicate::str::contains("✅").not());
}

#[test]
fn test_color_never_overrides_force() {
    let fixture = folder_fixture();
    fixture
        .command()
        .env_remove("NO_COLOR")
        .env("CLICOLOR_FORCE", "1")
        .args(["--color", "never", "validate", "--config"])
        .arg(fixture.config_path())
        .assert()
        .code(0)
        .stdout(predicate::str::contains("🔍").not());
}
