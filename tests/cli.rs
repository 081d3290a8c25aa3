//! End-to-end tests for the buildrun binary

mod common;

use assert_cmd::Command;
use common::{create_test_config, create_test_config_in_subdir};
use predicates::prelude::*;
use std::fs;

fn buildrun() -> Command {
    let mut cmd = Command::cargo_bin("buildrun").unwrap();
    cmd.env_remove("BUILDRUN_LOG");
    cmd
}

const PIPELINE: &str = r#"
default: package
vars:
  Configuration: Release
tasks:
  version:
    usage: Resolve version
    run:
      - capture: { var: version, exec: "echo 1.4.2" }
  package:
    usage: Build the package
    depends: [version]
    run:
      - mkdir -p out
      - name: manifest
        command: "echo ${version}-${Configuration} > out/version.txt"
      - assert: { file-count: { pattern: "out/*.txt", equals: 1 } }
  docs:
    usage: Build docs
    when: { var-set: WithDocs }
    run: touch docs.txt
  secret:
    private: true
    run: echo hidden
"#;

#[test]
fn test_default_task_runs_with_dependencies() {
    let (dir, config_path) = create_test_config(PIPELINE);

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 succeeded, 0 skipped, 0 failed, 0 aborted"));

    let version = fs::read_to_string(dir.path().join("out/version.txt")).unwrap();
    assert_eq!(version.trim(), "1.4.2-Release");
}

#[test]
fn test_config_found_from_subdirectory() {
    let (dir, _config_path, sub_dir) = create_test_config_in_subdir(PIPELINE);

    buildrun()
        .current_dir(&sub_dir)
        .arg("package")
        .assert()
        .success();

    assert!(dir.path().join("out/version.txt").exists());
}

#[test]
fn test_guarded_task_skipped_without_param() {
    let (dir, config_path) = create_test_config(PIPELINE);

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("docs")
        .assert()
        .success()
        .stderr(predicate::str::contains("0 succeeded, 1 skipped"));
    assert!(!dir.path().join("docs.txt").exists());

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .args(["docs", "-p", "WithDocs"])
        .assert()
        .success();
    assert!(dir.path().join("docs.txt").exists());
}

#[test]
fn test_list_hides_private_tasks() {
    let (_dir, config_path) = create_test_config(PIPELINE);

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("--list")
        .assert()
        .success()
        .stdout(predicate::str::contains("package"))
        .stdout(predicate::str::contains("Build the package"))
        .stdout(predicate::str::contains("secret").not());
}

#[test]
fn test_failing_task_exits_non_zero() {
    let (_dir, config_path) = create_test_config(
        r#"
tasks:
  broken:
    run: "exit 3"
  fine:
    run: "true"
  all:
    depends: [broken, fine]
"#,
    );

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("all")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 succeeded, 0 skipped, 1 failed, 1 aborted"))
        .stderr(predicate::str::contains("exit code Some(3)"));
}

#[test]
fn test_cycle_exits_non_zero() {
    let (_dir, config_path) = create_test_config(
        r#"
tasks:
  a:
    depends: b
  b:
    depends: a
"#,
    );

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("a")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Circular dependency detected"));
}

#[test]
fn test_unknown_task_exits_non_zero() {
    let (_dir, config_path) = create_test_config(PIPELINE);

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'deploy' is not defined"));
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::TempDir::new().unwrap();

    buildrun()
        .current_dir(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to find build file"));
}

#[test]
fn test_log_file_written() {
    let (dir, config_path) = create_test_config(PIPELINE);
    let log = dir.path().join("logs/run.log");

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .arg("--log-file")
        .arg(&log)
        .args(["version", "package"])
        .assert()
        .success();

    let text = fs::read_to_string(log).unwrap();
    assert!(text.contains("run version started"));
    assert!(text.contains("run package started"));
    assert!(text.contains("step manifest succeeded"));
}

#[test]
fn test_completions() {
    buildrun()
        .args(["--completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("buildrun"));
}

#[test]
fn test_silent_prints_nothing() {
    let (_dir, config_path) = create_test_config(PIPELINE);

    buildrun()
        .arg("-f")
        .arg(&config_path)
        .args(["-s", "version"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty());
}
