//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Returns a Command configured to run our binary, logging into a scratch
/// directory.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("KEEL_LOG_DIR", std::env::temp_dir().join("keel-cli-tests"))
        .env_remove("KEEL_REGISTRY_USERNAME")
        .env_remove("KEEL_REGISTRY_TOKEN");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn stdout_json(output: &assert_cmd::assert::Assert) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    serde_json::from_str(&stdout).expect("stdout should be valid JSON")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("set-version"))
        .stdout(predicate::str::contains("KEEL_REGISTRY_TOKEN"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// =============================================================================
// Info Command
// =============================================================================

#[test]
fn info_shows_package_name_and_version() {
    cmd()
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_NAME")))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn info_json_lists_detected_packages() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, "package.json", r#"{"name": "web", "version": "3.2.1"}"#);

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info", "--json"])
        .assert()
        .success();
    let json = stdout_json(&output);

    assert_eq!(json["name"], env!("CARGO_PKG_NAME"));
    assert_eq!(json["config"]["tag_prefix"], "v");
    assert_eq!(json["packages"][0]["ecosystem"], "npm");
    assert_eq!(json["packages"][0]["version"], "3.2.1");
}

// =============================================================================
// Next Command
// =============================================================================

#[test]
fn next_minor_label_from_file() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp,
        "prs.json",
        r#"[{"number": 10, "labels": [{"name": "release:minor"}]},
            {"number": 11, "labels": [{"name": "release:patch"}]}]"#,
    );

    cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["next", "--prs", "prs.json", "--previous", "1.4.2"])
        .assert()
        .success()
        .stdout(predicate::str::diff("1.5.0\n"));
}

#[test]
fn next_reads_stdin() {
    cmd()
        .args(["next", "--prs", "-", "--previous", "v2.0.0"])
        .write_stdin(r#"[{"number": 1, "labels": ["release:major"]}]"#)
        .assert()
        .success()
        .stdout(predicate::str::diff("3.0.0\n"));
}

#[test]
fn next_unanimous_skip_prints_skip() {
    cmd()
        .args(["next", "--prs", "-", "--previous", "1.0.0"])
        .write_stdin(
            r#"[{"number": 1, "labels": ["release:skip"]},
                {"number": 2, "labels": ["release:skip", "docs"]}]"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::diff("skip\n"));
}

#[test]
fn next_partial_skip_still_releases() {
    cmd()
        .args(["next", "--prs", "-", "--previous", "1.0.0"])
        .write_stdin(
            r#"[{"number": 1, "labels": ["release:skip"]},
                {"number": 2, "labels": []}]"#,
        )
        .assert()
        .success()
        .stdout(predicate::str::diff("1.0.1\n"));
}

#[test]
fn next_json_reports_decision() {
    let output = cmd()
        .args(["--json", "next", "--prs", "-", "--previous", "1.4.2"])
        .write_stdin(r#"[{"number": 3, "labels": ["release:minor", "release:rc"]}]"#)
        .assert()
        .success();
    let json = stdout_json(&output);

    assert_eq!(json["previous"], "1.4.2");
    assert_eq!(json["decision"]["bump"], "minor");
    assert_eq!(json["decision"]["prerelease"], "rc");
    assert!(json["next"].as_str().unwrap().starts_with("1.5.0-rc."));
}

#[test]
fn next_rejects_malformed_prs() {
    cmd()
        .args(["next", "--prs", "-", "--previous", "1.0.0"])
        .write_stdin("{\"oops\": true}")
        .assert()
        .failure()
        .stderr(predicate::str::contains("pull requests"));
}

#[test]
fn next_rejects_invalid_previous() {
    cmd()
        .args(["next", "--previous", "not-a-version"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--previous"));
}

// =============================================================================
// Set-Version Command
// =============================================================================

#[test]
fn set_version_updates_npm_package() {
    let tmp = TempDir::new().unwrap();
    write(
        &tmp,
        "package.json",
        "{\n  \"name\": \"web\",\n  \"version\": \"1.0.0\",\n  \"private\": true\n}\n",
    );

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "set-version", "1.1.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("package.json"));

    let written = fs::read_to_string(tmp.path().join("package.json")).unwrap();
    assert!(written.contains("\"version\": \"1.1.0\""), "{written}");
    assert!(written.contains("\"private\": true"));
}

#[test]
fn set_version_dry_run_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, ".keel.toml", "[[packages]]\npath = \".\"\necosystem = \"custom\"\n");
    write(&tmp, "VERSION", "0.1.0\n");

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["--json", "set-version", "0.2.0", "--dry-run"])
        .assert()
        .success();
    let json = stdout_json(&output);

    assert_eq!(json["dry_run"], true);
    assert_eq!(json["files"][0], "VERSION");
    assert_eq!(
        fs::read_to_string(tmp.path().join("VERSION")).unwrap(),
        "0.1.0\n"
    );
}

#[test]
fn set_version_rejects_invalid_version() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, "package.json", r#"{"version": "1.0.0"}"#);

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "set-version", "one"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid version"));
}

#[test]
fn set_version_without_ecosystem_fails() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "set-version", "1.0.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no ecosystem detected"));
}

// =============================================================================
// Publish & Cleanup Commands
// =============================================================================

#[test]
fn publish_dry_run_reports_packages() {
    let tmp = TempDir::new().unwrap();
    write(&tmp, "package.json", r#"{"name": "web", "version": "4.0.0"}"#);

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["--json", "publish", "--dry-run"])
        .assert()
        .success();
    let json = stdout_json(&output);

    assert_eq!(json["packages"][0]["status"], "published");
    assert_eq!(json["packages"][0]["version"], "4.0.0");
}

#[test]
fn cleanup_without_policy_is_a_no_op() {
    let tmp = TempDir::new().unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active cleanup policy"));
}

/// Initializes a git repository in `dir`; `false` when git is unavailable.
fn git_init(dir: &TempDir) -> bool {
    std::process::Command::new("git")
        .args(["init", "--quiet"])
        .current_dir(dir.path())
        .status()
        .is_ok_and(|status| status.success())
}

#[test]
fn cleanup_with_nothing_to_delete_reports_real_run() {
    let tmp = TempDir::new().unwrap();
    if !git_init(&tmp) {
        return;
    }
    write(&tmp, ".keel.toml", "[cleanup.dev]\ntags = true\nkeep = 1\n");

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "--json", "cleanup"])
        .assert()
        .success();
    let json = stdout_json(&output);

    assert_eq!(json["dry_run"], false);
    assert!(json["tags_deleted"].as_array().unwrap().is_empty());
}

#[test]
fn cleanup_dry_run_with_nothing_to_delete_reports_dry_run() {
    let tmp = TempDir::new().unwrap();
    if !git_init(&tmp) {
        return;
    }
    write(&tmp, ".keel.toml", "[cleanup.dev]\ntags = true\nkeep = 1\n");

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["--json", "cleanup", "--dry-run"])
        .assert()
        .success();
    assert_eq!(stdout_json(&output)["dry_run"], true);
}

// =============================================================================
// Global Flags
// =============================================================================

#[test]
fn quiet_flag_accepted() {
    cmd().args(["--quiet", "info"]).assert().success();
}

#[test]
fn multiple_verbose_flags_accepted() {
    cmd().args(["-vv", "info"]).assert().success();
}

#[test]
fn color_never_accepted() {
    cmd().args(["--color", "never", "info"]).assert().success();
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn invalid_subcommand_shows_error() {
    cmd()
        .arg("not-a-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn chdir_nonexistent_fails() {
    cmd()
        .args(["-C", "/nonexistent/path/that/does/not/exist", "info"])
        .assert()
        .failure();
}
