use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const POSES: &str = "\
park
1500,1500,1500,0
1500,1500,1500,0
1500,1500,1500,0
1500,1500,1500,0
1500,1500,1500,0
1500,1500,1500,0
extend
2000,2000,2000,0
2000,2000,2000,0
2000,2000,2000,0
2000,2000,2000,0
2000,2000,2000,0
2000,2000,2000,0
";

// Minimal config for sim mode, fast enough for tests.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let pose_path = dir.path().join("poses");
    fs::write(&pose_path, POSES).unwrap();
    let toml = format!(
        r#"
[poses]
file = "{}"

[animation]
poll_ms = 1
motion_timeout_ms = 50
settle_ms = 0

[routes]
extend = ["park"]
park = ["park"]
"#,
        pose_path.display()
    );
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[test]
fn help_prints_usage() {
    Command::cargo_bin("spider_cli")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn self_check_passes_in_sim() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    Command::cargo_bin("spider_cli")
        .unwrap()
        .args(["--config", cfg.to_str().unwrap(), "self-check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn animate_reaches_pose_in_sim() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    Command::cargo_bin("spider_cli")
        .unwrap()
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "animate",
            "extend",
            "--duration-ms",
            "100",
        ])
        .assert()
        .success();
}

#[test]
fn unknown_pose_is_rejected() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    Command::cargo_bin("spider_cli")
        .unwrap()
        .args(["--config", cfg.to_str().unwrap(), "animate", "handstand"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("handstand"));
}

#[test]
fn off_powers_down_all_channels() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    Command::cargo_bin("spider_cli")
        .unwrap()
        .args(["--config", cfg.to_str().unwrap(), "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all servos off"));
}

#[test]
fn bad_config_fails_with_context() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(&path, "[proximity]\nvalid_min_cm = 900.0\nvalid_max_cm = 10.0\n").unwrap();
    Command::cargo_bin("spider_cli")
        .unwrap()
        .args(["--config", path.to_str().unwrap(), "moving"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("valid band"));
}
