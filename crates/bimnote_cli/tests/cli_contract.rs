use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;

fn bimnote(db: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("bimnote");
    cmd.env_remove("BIMNOTE_CONFIG")
        .env_remove("BIMNOTE_LOG_DIR")
        .arg("--db")
        .arg(db);
    cmd
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should contain valid json")
}

#[test]
fn add_then_list_round_trips_through_database() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("notes.sqlite3");

    let added = bimnote(&db)
        .args(["--project", "bridge-01", "add", "--world", "0,0,0"])
        .args(["--severity", "warning", "--comment", "Check this joint."])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let added = stdout_json(&added);
    assert_eq!(added["schemaVersion"], "1.0");
    assert_eq!(added["anchor"]["type"], "world");
    assert_eq!(added["createdAt"], added["updatedAt"]);

    let listed = bimnote(&db)
        .args(["--project", "bridge-01", "list"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listed = stdout_json(&listed);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["id"], added["id"]);
}

#[test]
fn update_and_delete_report_missing_ids() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("notes.sqlite3");

    bimnote(&db)
        .args(["update", "ghost-id", "--status", "closed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("annotation not found: ghost-id"));

    bimnote(&db)
        .args(["delete", "ghost-id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("annotation not found"));
}

#[test]
fn export_writes_pretty_json_file() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("notes.sqlite3");
    let output = temp.path().join("out").join("annotations.json");

    bimnote(&db)
        .args(["add", "--object-id", "element-42", "--kind", "markup"])
        .assert()
        .success();
    bimnote(&db)
        .arg("export")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("annotations.json"));

    let exported: Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(exported.as_array().unwrap().len(), 1);
    assert_eq!(exported[0]["anchor"]["objectId"], "element-42");
    assert_eq!(exported[0]["type"], "markup");
}

#[test]
fn add_requires_an_anchor() {
    let temp = tempfile::tempdir().unwrap();
    bimnote(&temp.path().join("notes.sqlite3"))
        .args(["add", "--comment", "floating"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--object-id or --world"));
}

#[test]
fn rejects_unsafe_project_ids() {
    let temp = tempfile::tempdir().unwrap();
    bimnote(&temp.path().join("notes.sqlite3"))
        .args(["--project", "../etc", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid project id"));
}

#[test]
fn version_prints_crate_version() {
    let temp = tempfile::tempdir().unwrap();
    bimnote(&temp.path().join("notes.sqlite3"))
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn projects_lists_annotated_and_converted_ids() {
    let temp = tempfile::tempdir().unwrap();
    let db = temp.path().join("notes.sqlite3");
    fs::create_dir_all(temp.path().join("data").join("tunnel-02")).unwrap();

    bimnote(&db)
        .current_dir(temp.path())
        .args(["--project", "bridge-01", "add", "--object-id", "pier-3"])
        .assert()
        .success();
    let output = bimnote(&db)
        .current_dir(temp.path())
        .arg("projects")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let projects = stdout_json(&output);
    assert_eq!(projects["annotated"], serde_json::json!(["bridge-01"]));
    assert_eq!(projects["converted"], serde_json::json!(["tunnel-02"]));
}
