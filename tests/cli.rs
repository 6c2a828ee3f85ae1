//! Command-line behavior of the toolhost binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn tools_root() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let package = temp_dir.path().join("case-transform");
    fs::create_dir_all(&package).unwrap();
    fs::write(
        package.join("metadata.yaml"),
        "id: case-transform\nname: Case Transform\nversion: 1.0.0\n",
    )
    .unwrap();
    fs::write(package.join("case-transform.tool"), "").unwrap();
    temp_dir
}

fn toolhost(root: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("toolhost").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("TOOLHOST_LOADER")
        .env_remove("TOOLHOST_CONFIG")
        .arg("--tools-dir")
        .arg(root.path());
    cmd
}

#[test]
fn list_prints_catalog() {
    let root = tools_root();
    toolhost(&root)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"id\": \"case-transform\""))
        .stdout(predicate::str::contains("\"version\": \"1.0.0\""));
}

#[test]
fn run_prints_result() {
    let root = tools_root();
    toolhost(&root)
        .args(["run", "case-transform", "-p", "inputText=Hello World"])
        .args(["-p", "transformationType=titlecase"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"transformedText\": \"Hello World\""));
}

#[test]
fn run_with_json_params() {
    let root = tools_root();
    toolhost(&root)
        .args(["run", "case-transform", "--params", r#"{"inputText": "Hello World"}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("HELLO WORLD"));
}

#[test]
fn run_unknown_variant_exits_one() {
    let root = tools_root();
    toolhost(&root)
        .args(["run", "case-transform", "-p", "inputText=x", "-p", "transformationType=reverse"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("\"kind\":\"ExecutionError\""));
}

#[test]
fn show_unknown_tool_exits_two() {
    let root = tools_root();
    toolhost(&root)
        .args(["show", "nope"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("\"kind\":\"NotFound\""));
}
