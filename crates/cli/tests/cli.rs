//! CLI integration tests.
//!
//! Each test writes a `safekeep.toml` and a state file into a fresh
//! `TempDir` and runs the `safekeep` binary against them.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const STATE: &str = r#"{
  "categories": [
    {"id": "cat-1", "name": "Starters"},
    {"id": "cat-2", "name": "Mains"}
  ],
  "menu": [
    {"id": "dish-1", "name": "Soup", "price": 6.5, "categoryId": "cat-1"},
    {"id": "dish-2", "name": "Steak", "price": 24, "categoryId": "cat-2"}
  ],
  "settings": {"restaurantName": "Chez CLI", "currency": "EUR"}
}"#;

/// A workspace with a filesystem-backed config, three mirrors, one
/// simulated replica, and a valid state file.
fn workspace() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    fs::write(root.join("state.json"), STATE).expect("write state");
    let config = format!(
        r#"
[storage]
backend = "filesystem"
root = "{data}"
mirrors = 3

[encryption]
secret = "correct horse battery staple"

[[remote.replicas]]
kind = "simulated"
name = "dr-site"

[state]
source_file = "{state}"
"#,
        data = root.join("data").display(),
        state = root.join("state.json").display(),
    );
    fs::write(root.join("safekeep.toml"), config).expect("write config");
    dir
}

fn safekeep(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("safekeep");
    cmd.current_dir(dir);
    cmd
}

fn backup_id(dir: &Path) -> String {
    let out = safekeep(dir)
        .args(["--output", "json", "backup"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("backup json");
    value["backup"]["id"]
        .as_str()
        .expect("backup id")
        .to_string()
}

// ──────────────────────────────────────────────
// 1. Help, version, configuration errors
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("safekeep")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Encrypted, replicated backups"));
}

#[test]
fn version_exits_0() {
    cargo_bin_cmd!("safekeep")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("safekeep"));
}

#[test]
fn missing_config_reports_json_error() {
    let dir = TempDir::new().expect("tempdir");
    safekeep(dir.path())
        .args(["--output", "json", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("\"error\""))
        .stderr(predicate::str::contains("safekeep.toml"));
}

#[test]
fn quiet_suppresses_errors() {
    let dir = TempDir::new().expect("tempdir");
    safekeep(dir.path())
        .args(["--quiet", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

#[test]
fn config_without_secret_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    fs::write(dir.path().join("safekeep.toml"), "[storage]\nmirrors = 0\n").expect("write");
    safekeep(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no encryption secret"));
}

// ──────────────────────────────────────────────
// 2. Backups
// ──────────────────────────────────────────────

#[test]
fn backup_then_list_and_show() {
    let dir = workspace();
    let id = backup_id(dir.path());
    assert!(id.starts_with("backup_"));

    let out = safekeep(dir.path())
        .args(["--output", "json", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let list: serde_json::Value = serde_json::from_slice(&out).expect("list json");
    let list = list.as_array().expect("array");
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], id.as_str());
    assert_eq!(list[0]["status"], "INTEGRATED");
    let tiers = list[0]["storageTiers"].as_array().expect("tiers");
    assert!(tiers.contains(&serde_json::json!("LOCAL")));
    assert!(tiers.contains(&serde_json::json!("MIRROR")));
    assert!(tiers.contains(&serde_json::json!("REMOTE")));

    safekeep(dir.path())
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("INTEGRATED"))
        .stdout(predicate::str::contains("encrypted: true"));
}

#[test]
fn show_unknown_backup_fails() {
    let dir = workspace();
    safekeep(dir.path())
        .args(["show", "backup_0_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no backup with id"));
}

#[test]
fn restore_round_trips_and_unknown_id_fails() {
    let dir = workspace();
    let id = backup_id(dir.path());

    safekeep(dir.path())
        .args(["restore", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("restored state from"));
    assert!(dir.path().join("data/entities/entity_menu").exists());

    safekeep(dir.path())
        .args(["restore", "backup_0_000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("restore from backup"));
}

// ──────────────────────────────────────────────
// 3. Snapshots
// ──────────────────────────────────────────────

#[test]
fn snapshot_is_listed_and_rewindable() {
    let dir = workspace();
    let out = safekeep(dir.path())
        .args(["--quiet", "snapshot", "--label", "before lunch"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let id = String::from_utf8(out).expect("utf8").trim().to_string();
    assert!(id.starts_with("snap_"));

    safekeep(dir.path())
        .arg("snapshots")
        .assert()
        .success()
        .stdout(predicate::str::contains("before lunch"))
        .stdout(predicate::str::contains(id.as_str()));

    safekeep(dir.path())
        .args(["rewind", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("rewound state"));
}

// ──────────────────────────────────────────────
// 4. Verification, health, reports
// ──────────────────────────────────────────────

#[test]
fn verify_detects_tampered_blob() {
    let dir = workspace();
    let id = backup_id(dir.path());

    safekeep(dir.path())
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("checked 1 backups: 0 corrupted"));

    fs::write(
        dir.path().join("data/local").join(format!("backup_data_{id}")),
        b"definitely not ciphertext",
    )
    .expect("tamper");

    safekeep(dir.path())
        .arg("verify")
        .assert()
        .failure()
        .stdout(predicate::str::contains("corrupted  "))
        .stderr(predicate::str::contains("1 corrupted backup(s)"));

    safekeep(dir.path())
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("CORRUPTED"));
}

#[test]
fn health_reports_valid_state() {
    let dir = workspace();
    safekeep(dir.path())
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("state: healthy"));
}

#[test]
fn report_counts_backups() {
    let dir = workspace();
    backup_id(dir.path());
    let out = safekeep(dir.path())
        .args(["--output", "json", "report"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: serde_json::Value = serde_json::from_slice(&out).expect("report json");
    assert_eq!(report["totalBackups"], 1);
    assert_eq!(report["security"]["encryption"], "ChaCha20-Poly1305");
}

#[test]
fn watch_once_takes_an_auto_backup() {
    let dir = workspace();
    safekeep(dir.path())
        .args(["watch", "--once"])
        .assert()
        .success()
        .stdout(predicate::str::contains("healthy:   true"))
        .stdout(predicate::str::contains("backup:    backup_"));
}
