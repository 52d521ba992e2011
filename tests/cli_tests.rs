//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn pelotari() -> Command {
    let mut cmd = Command::cargo_bin("pelotari").unwrap();
    // Keep the host environment out of config resolution
    for key in [
        "PELOTARI_CONFIG",
        "PELOTARI_MAX_PEERS",
        "PELOTARI_BROADCAST_INTERVAL_MS",
        "PELOTARI_INTERFACE",
        "PELOTARI_LOG_LEVEL",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    pelotari()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("peer discovery"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("interfaces"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    pelotari()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pelotari"))
        .stdout(predicate::str::contains("Git Hash"))
        .stdout(predicate::str::contains("udp/21451"));
}

#[test]
fn test_short_version_flag() {
    pelotari()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pelotari"));
}

// ─────────────────────────────────────────────────────────────────
// Config Commands
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_validate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("node.toml");

    pelotari()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration written"));
    assert!(path.exists());

    pelotari()
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));

    // A second init without --force refuses to overwrite
    pelotari()
        .args(["config", "init", "--path"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_show_explicit_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("node.toml");
    std::fs::write(&path, "[protocol]\nmax_peers = 3\n").unwrap();

    pelotari()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[protocol]"))
        .stdout(predicate::str::contains("max_peers = 3"))
        .stdout(predicate::str::contains("[network]"))
        .stdout(predicate::str::contains("unicast_port = 21450"));
}

#[test]
fn test_config_validate_nonexistent_file() {
    pelotari()
        .args(["config", "validate", "--config", "/nonexistent/path/node.toml"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("E100"))
        .stderr(predicate::str::contains("config init"));
}

// ─────────────────────────────────────────────────────────────────
// Run Command
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    pelotari()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--max-peers"))
        .stdout(predicate::str::contains("--interval-ms"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_run_with_missing_config() {
    pelotari()
        .args(["run", "--config", "/nonexistent/node.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_run_rejects_zero_max_peers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("node.toml");
    std::fs::write(&path, "").unwrap();

    pelotari()
        .args(["run", "--max-peers", "0", "--config"])
        .arg(&path)
        .assert()
        .code(10)
        .stderr(predicate::str::contains("max_peers"));
}

#[test]
fn test_run_failure_is_logged_with_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("node.toml");
    std::fs::write(&path, "[network]\ninterface = \"pelotari-none0\"\n").unwrap();

    pelotari()
        .args(["run", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Node failed: [E"));
}

// ─────────────────────────────────────────────────────────────────
// Flags and Errors
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_verbosity_flags() {
    pelotari().args(["-vv", "version"]).assert().success();
    pelotari().args(["--quiet", "version"]).assert().success();
}

#[test]
fn test_unknown_command() {
    pelotari()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_subcommand() {
    pelotari().assert().failure();
}
