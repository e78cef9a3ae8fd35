//! Integration tests for the subdiff CLI

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

use common::*;

/// Test helper to get the CLI binary
fn subdiff_cmd() -> Command {
    Command::cargo_bin("subdiff").unwrap()
}

#[test]
fn test_help_lists_commands() {
    subdiff_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("print-default-config"))
        .stdout(predicate::str::contains("validate-config"));
}

#[test]
fn test_print_default_config_is_yaml() {
    let output = subdiff_cmd()
        .arg("print-default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("strategy: alignment"))
        .stdout(predicate::str::contains("kernel.tar.gz"))
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).unwrap();
    let yaml: String = text
        .lines()
        .filter(|line| !line.contains("# "))
        .collect::<Vec<_>>()
        .join("\n");
    let parsed: subdiff::SubdiffConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate().is_ok());
}

#[test]
fn test_init_config_refuses_to_overwrite() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("subdiff.yml");

    subdiff_cmd()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.is_file());

    subdiff_cmd()
        .args(["init-config", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    subdiff_cmd()
        .args(["init-config", "--force", "--output"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn test_validate_config_accepts_and_rejects() {
    let temp = tempdir().unwrap();
    let good = temp.path().join("good.yml");
    fs::write(&good, "similarity:\n  strategy: delegated\n").unwrap();
    subdiff_cmd()
        .arg("validate-config")
        .arg(&good)
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));

    let bad = temp.path().join("bad.yml");
    fs::write(&bad, "similarity:\n  strategy: guesswork\n").unwrap();
    subdiff_cmd()
        .arg("validate-config")
        .arg(&bad)
        .assert()
        .failure();
}

#[test]
fn test_run_writes_report_into_default_folder() {
    let temp = tempdir().unwrap();
    let baseline = baseline(temp.path());
    let submissions = submissions(temp.path());
    write_text_zip(&submissions.join("a.zip"), &[("a.c", MAIN_C), ("b.c", SCHEDULER_C)]);
    write_text_zip(&submissions.join("b.zip"), &[("b.c", SCHEDULER_C)]);
    fs::write(submissions.join("c.zip"), "garbage").unwrap();

    subdiff_cmd()
        .arg("run")
        .arg(&submissions)
        .arg("--baseline")
        .arg(&baseline)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.zip"))
        .stdout(predicate::str::contains("ExtractionError"));

    assert!(submissions.join("html_diff").join("index.html").is_file());
}

#[test]
fn test_run_quiet_with_explicit_output_and_filter() {
    let temp = tempdir().unwrap();
    let baseline = baseline(temp.path());
    let submissions = submissions(temp.path());
    write_text_zip(&submissions.join("a.zip"), &[("b.c", SCHEDULER_C)]);
    let out = temp.path().join("report");

    subdiff_cmd()
        .arg("run")
        .arg(&submissions)
        .arg("--baseline")
        .arg(&baseline)
        .arg("--out")
        .arg(&out)
        .args(["--filter", "b.c", "--strategy", "delegated", "--facility", "token-overlap"])
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let index = fs::read_to_string(out.join("index.html")).unwrap();
    assert!(index.contains("a.zip"));
    assert!(!submissions.join("html_diff").exists());
}

#[test]
fn test_run_with_missing_baseline_fails() {
    let temp = tempdir().unwrap();
    let submissions = submissions(temp.path());

    subdiff_cmd()
        .arg("run")
        .arg(&submissions)
        .arg("--baseline")
        .arg(temp.path().join("absent"))
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("baseline"));
}
