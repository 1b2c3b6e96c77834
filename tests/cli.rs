// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 plumber contributors

//! Command-line behaviour

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn plumber() -> Command {
    Command::cargo_bin("plumber").unwrap()
}

fn write(dir: &TempDir, name: &str, text: &str) {
    fs::write(dir.path().join(name), text).unwrap();
}

#[test]
fn test_run_success() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.yaml",
        r#"
phases:
  - name: greet
    actions:
      - name: hello
        pipeline: echo 'hello from plumber'
"#,
    );

    plumber()
        .current_dir(dir.path())
        .args(["run", "pipeline.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("hello from plumber"))
        .stdout(predicate::str::contains("Finished: SUCCESS"));
}

#[test]
fn test_run_failure_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.yaml",
        r#"
phases:
  - name: test
    actions:
      - name: broken
        pipeline: error 'boom'
"#,
    );

    plumber()
        .args(["-C", dir.path().to_str().unwrap(), "run", "pipeline.yaml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ERROR: boom"))
        .stderr(predicate::str::contains("Pipeline finished with FAILURE"));
}

#[test]
fn test_run_unstable_still_succeeds() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.yaml",
        r#"
phases:
  - name: test
    actions:
      - name: flaky
        pipeline: unstable 'flaked'
"#,
    );

    plumber()
        .current_dir(dir.path())
        .args(["run", "pipeline.yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished: UNSTABLE"));
}

#[test]
fn test_run_json_report_from_toml() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "build.toml",
        r#"
[[phases]]
name = "build"

[[phases.actions]]
name = "show"
action = "echoParams"
params = { target = "release" }
"#,
    );

    let output = plumber()
        .current_dir(dir.path())
        .args(["run", "build.toml", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["result"]["severity"], "SUCCESS");
    assert_eq!(report["result"]["phases"][0]["phase"], "build");
    let lines: Vec<&str> = report["log"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["line"].as_str())
        .collect();
    assert!(lines.contains(&"echoing target == release"));
}

#[test]
fn test_run_explicit_document_format() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.txt",
        r#"{"phases": [{"name": "p", "actions": [{"name": "a", "pipeline": "echo 'from json'"}]}]}"#,
    );

    plumber()
        .current_dir(dir.path())
        .args(["run", "pipeline.txt", "--format-doc", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("from json"));
}

#[test]
fn test_run_missing_file() {
    let dir = TempDir::new().unwrap();

    plumber()
        .current_dir(dir.path())
        .args(["run", "nope.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.yaml"));
}

#[test]
fn test_validate_reports_reserved_steps() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.yaml",
        r#"
phases:
  - name: build
    actions:
      - name: sneaky
        pipeline: stage('x') { echo 'no' }
"#,
    );

    plumber()
        .current_dir(dir.path())
        .args(["validate", "pipeline.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Illegal Pipeline steps used in inline Pipeline - stage",
        ));
}

#[test]
fn test_validate_verbose_summary() {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "pipeline.yaml",
        r#"
phases:
  - name: build
    concurrency: 1
    actions:
      - name: compile
        action: shell
        params:
          script: "true"
      - name: lint
        pipeline: echo 'lint'
"#,
    );

    plumber()
        .current_dir(dir.path())
        .args(["validate", "pipeline.yaml", "--verbose"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"))
        .stdout(predicate::str::contains("runs 1 at a time"))
        .stdout(predicate::str::contains("step=shell"));
}

#[test]
fn test_contributors_lists_defaults() {
    plumber()
        .arg("contributors")
        .assert()
        .success()
        .stdout(predicate::str::contains("echoParams"))
        .stdout(predicate::str::contains("shell"))
        .stdout(predicate::str::contains("sleep"));
}
