//! Configuration integration tests.
//!
//! These tests verify config discovery, format parsing, and precedence
//! from an end-to-end perspective using the compiled binary. `info --json`
//! echoes the effective settings, so precedence is asserted on its output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap();
    cmd.env("KEEL_LOG_DIR", std::env::temp_dir().join("keel-cli-tests"));
    cmd
}

/// Effective configuration as reported by `info --json` run in `dir`.
fn effective_config(dir: &Path) -> serde_json::Value {
    let output = cmd()
        .args(["-C", dir.to_str().unwrap(), "--json", "info"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    json["config"].clone()
}

// =============================================================================
// Config File Discovery
// =============================================================================

#[test]
fn runs_without_config_file() {
    let tmp = TempDir::new().unwrap();
    let config = effective_config(tmp.path());
    assert!(config.get("config_file").is_none());
    assert_eq!(config["tag_prefix"], "v");
}

#[test]
fn discovers_dotfile_config_in_current_dir() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".keel.toml"),
        "[release]\ntag_prefix = \"release-\"\n",
    )
    .unwrap();

    let config = effective_config(tmp.path());
    assert_eq!(config["tag_prefix"], "release-");
    assert!(
        config["config_file"]
            .as_str()
            .unwrap()
            .ends_with(".keel.toml")
    );
}

#[test]
fn discovers_config_in_parent_directory() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("nested").join("deep");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(
        tmp.path().join("keel.toml"),
        "[release]\ndefault_bump = \"minor\"\n",
    )
    .unwrap();

    assert_eq!(effective_config(&sub_dir)["default_bump"], "minor");
}

#[test]
fn dotfile_takes_precedence_over_regular_name() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[release]\nremote = \"upstream\"\n").unwrap();
    fs::write(tmp.path().join("keel.toml"), "[release]\nremote = \"fork\"\n").unwrap();

    assert_eq!(effective_config(tmp.path())["remote"], "upstream");
}

#[test]
fn closer_config_takes_precedence() {
    let tmp = TempDir::new().unwrap();
    let sub_dir = tmp.path().join("project");
    fs::create_dir_all(&sub_dir).unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[release]\ntag_prefix = \"outer-\"\n").unwrap();
    fs::write(sub_dir.join(".keel.toml"), "[release]\ntag_prefix = \"inner-\"\n").unwrap();

    assert_eq!(effective_config(&sub_dir)["tag_prefix"], "inner-");
}

#[test]
fn git_boundary_stops_config_search() {
    let tmp = TempDir::new().unwrap();
    let repo = tmp.path().join("repo");
    let src = repo.join("src");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir(repo.join(".git")).unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[release]\ntag_prefix = \"outside-\"\n").unwrap();

    assert_eq!(effective_config(&src)["tag_prefix"], "v");
}

#[test]
fn explicit_config_flag_overrides_discovery() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[release]\ntag_prefix = \"found-\"\n").unwrap();
    let explicit = tmp.path().join("ci.toml");
    fs::write(&explicit, "[release]\ntag_prefix = \"ci-\"\n").unwrap();

    let output = cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["--config", explicit.to_str().unwrap(), "--json", "info"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["config"]["tag_prefix"], "ci-");
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_yaml_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".keel.yaml"),
        "release:\n  tag_prefix: y-\ncleanup:\n  rc:\n    tags: true\n    keep: 2\n",
    )
    .unwrap();

    let config = effective_config(tmp.path());
    assert_eq!(config["tag_prefix"], "y-");
    assert_eq!(config["cleanup_active"], true);
}

#[test]
fn parses_json_config() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".keel.json"),
        r#"{"log_level": "error", "release": {"default_bump": "major"}}"#,
    )
    .unwrap();

    let config = effective_config(tmp.path());
    assert_eq!(config["log_level"], "error");
    assert_eq!(config["default_bump"], "major");
}

#[test]
fn toml_preferred_over_yaml_in_same_directory() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[release]\nremote = \"toml\"\n").unwrap();
    fs::write(tmp.path().join(".keel.yaml"), "release:\n  remote: yaml\n").unwrap();

    assert_eq!(effective_config(tmp.path())["remote"], "toml");
}

#[test]
fn configured_packages_drive_set_version() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("docs")).unwrap();
    fs::write(tmp.path().join("docs/RELEASE"), "0.0.1").unwrap();
    fs::write(
        tmp.path().join(".keel.toml"),
        r#"
[[packages]]
path = "docs"
ecosystem = "custom"
version_file = "RELEASE"
"#,
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "set-version", "0.0.2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("docs/RELEASE"));

    assert_eq!(
        fs::read_to_string(tmp.path().join("docs/RELEASE")).unwrap(),
        "0.0.2"
    );
}

#[test]
fn custom_labels_change_next_decision() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.toml"), "[labels]\nminor = \"feature\"\n").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap()])
        .args(["next", "--prs", "-", "--previous", "0.3.0"])
        .write_stdin(r#"[{"number": 5, "labels": ["feature"]}]"#)
        .assert()
        .success()
        .stdout(predicate::str::diff("0.4.0\n"));
}

// =============================================================================
// Error Cases
// =============================================================================

#[test]
fn invalid_toml_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.toml"), "this is not valid toml [[[").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration"));
}

#[test]
fn invalid_json_config_shows_error() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".keel.json"), "{not valid json}").unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn unknown_ecosystem_is_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".keel.toml"),
        "[[packages]]\npath = \".\"\necosystem = \"maven\"\n",
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .failure();
}

#[test]
fn unknown_config_field_is_ignored() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join(".keel.toml"),
        r#"
log_level = "info"
unknown_field = "should be ignored"
another_unknown = 42
"#,
    )
    .unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "info"])
        .assert()
        .success();
}
