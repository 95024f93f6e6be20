//! Integration tests for the `kb` CLI.
//!
//! Each test creates a temp knowledge base, runs `kb` as a subprocess,
//! and verifies stdout and/or file contents.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn kb_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_kb"))
}

/// Create a knowledge base holding the `current.md` fixture and its screenshot.
fn create_test_kb(root: &Path) {
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/current.md");
    fs::copy(fixture, root.join("kb.md")).unwrap();
    fs::create_dir_all(root.join("screenshots")).unwrap();
    fs::write(
        root.join("screenshots/screenshot_2024-02-28_11-00-00.png"),
        b"png",
    )
    .unwrap();
    fs::write(root.join("topics.json"), r#"{"topics": ["planning", "team events"]}"#).unwrap();
}

/// Run `kb` with the given args in the given directory, returning (stdout, stderr, success).
fn run_kb(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(kb_bin())
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run kb");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `kb` expecting success, return stdout.
fn run_kb_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run_kb(dir, args);
    if !success {
        panic!("kb {:?} failed:\nstdout: {}\nstderr: {}", args, stdout, stderr);
    }
    stdout
}

#[test]
fn list_prints_newest_first() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["list"]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "2024-03-05 09:15:00  [note] Plan the offsite (in-progress) #team-events #planning"
    );
    assert!(lines[3].starts_with("2024-02-27 08:00:00  [pdf] contract.pdf"));
}

#[test]
fn list_filters_by_type_and_entity() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["list", "--type", "link"]);
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("Venue pricing"));

    let out = run_kb_ok(tmp.path(), &["list", "--entity", "task", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["timestamp"], "2024-03-05 09:15:00");
    assert_eq!(items[0]["status"], "in-progress");
}

#[test]
fn show_raw_prints_stored_form() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["show", "2024-02-27 08:00:00", "--raw"]);
    assert_eq!(
        out,
        "- `pdf` | `widget` | `2024-02-27 08:00:00` | contract.pdf\n\
         \x20 - [Attachment](files/contract_2024-02-27_08-00-00.pdf)\n\
         \x20 - Notes: Signed copy\n\
         \x20 - ParentId: 2024-02-26 10:00:00\n\n"
    );
}

#[test]
fn show_json_includes_blocks() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["--json", "show", "2024-03-04 16:20:00"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["type"], "link");
    assert_eq!(json["url"], "https://example.com/venues/pricing");
    assert_eq!(json["tabGroup"]["color"], "blue");
    assert!(
        json["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .any(|b| b["field"] == "readTime" && b["value"] == 3)
    );
}

#[test]
fn show_missing_entry_fails() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let (_, stderr, success) = run_kb(tmp.path(), &["show", "2030-01-01 00:00:00"]);
    assert!(!success);
    assert!(stderr.contains("entry not found: 2030-01-01 00:00:00"));
}

#[test]
fn status_moves_entry_between_columns() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["status", "2024-03-05 09:15:00", "done"]);
    assert_eq!(out.trim(), "2024-03-05 09:15:00 -> done");

    let text = fs::read_to_string(tmp.path().join("kb.md")).unwrap();
    assert!(text.contains("  - Status: done\n"));
    assert!(!text.contains("in-progress"));

    // An entry without a status gets one at its canonical position
    run_kb_ok(tmp.path(), &["status", "2024-03-04 16:20:00", "todo"]);
    let text = fs::read_to_string(tmp.path().join("kb.md")).unwrap();
    assert!(text.contains("  - Entity: knowledge\n  - Status: todo\n  - Topics: team events\n"));
}

#[test]
fn delete_removes_entry_and_screenshot() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    let out = run_kb_ok(tmp.path(), &["delete", "2024-02-28 11:00:00"]);
    assert!(out.contains("deleted 2024-02-28 11:00:00"));
    assert!(out.contains("removed screenshots/screenshot_2024-02-28_11-00-00.png"));
    assert!(!tmp.path().join("screenshots/screenshot_2024-02-28_11-00-00.png").exists());

    let text = fs::read_to_string(tmp.path().join("kb.md")).unwrap();
    assert!(!text.contains("2024-02-28 11:00:00` |"));
    assert_eq!(run_kb_ok(tmp.path(), &["list"]).lines().count(), 3);

    let (_, _, success) = run_kb(tmp.path(), &["delete", "2024-02-28 11:00:00"]);
    assert!(!success);
}

#[test]
fn topics_and_people() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());

    assert_eq!(run_kb_ok(tmp.path(), &["topics"]), "planning\nteam events\n");
    assert_eq!(run_kb_ok(tmp.path(), &["people"]), "");
    assert_eq!(run_kb_ok(tmp.path(), &["people", "--json"]).trim(), "[]");
}

#[test]
fn project_dir_flag() {
    let tmp = TempDir::new().unwrap();
    create_test_kb(tmp.path());
    let elsewhere = TempDir::new().unwrap();

    let dir = tmp.path().to_str().unwrap();
    let out = run_kb_ok(elsewhere.path(), &["-C", dir, "list", "-n", "1"]);
    assert_eq!(out.lines().count(), 1);
}

#[test]
fn empty_directory_lists_nothing() {
    let tmp = TempDir::new().unwrap();
    assert_eq!(run_kb_ok(tmp.path(), &["list"]), "");
}
