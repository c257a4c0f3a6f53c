//! Integration tests for the `cardbox` CLI.
//!
//! Each test creates a temp notebook directory, runs `cardbox` as a
//! subprocess, and verifies stdout and/or file contents.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

/// Run `cardbox` in `dir`, return (stdout, stderr, success).
fn run(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_cardbox"))
        .args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run cardbox");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// Run `cardbox` expecting success, return stdout.
fn run_ok(dir: &Path, args: &[&str]) -> String {
    let (stdout, stderr, success) = run(dir, args);
    if !success {
        panic!(
            "cardbox {:?} failed:\nstdout: {}\nstderr: {}",
            args, stdout, stderr
        );
    }
    stdout
}

/// Add a note and return its timestamp
fn add(dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    run_ok(dir, &full).trim().to_string()
}

fn day_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".md"))
        .collect();
    names.sort();
    names
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

#[test]
fn add_writes_a_day_file() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["Buy milk", "--tag", "Errand", "--label", "home/kitchen"]);

    let files = day_files(tmp.path());
    assert_eq!(files.len(), 1);
    let text = fs::read_to_string(tmp.path().join(&files[0])).unwrap();
    assert_eq!(
        text,
        format!("@[{}]\n[idx:1]\n#errand\n@home/kitchen\nBuy milk\n", ts)
    );
}

#[test]
fn two_quick_adds_get_distinct_timestamps() {
    let tmp = TempDir::new().unwrap();
    let a = add(tmp.path(), &["one"]);
    let b = add(tmp.path(), &["two"]);
    assert_ne!(a, b);

    let out = run_ok(tmp.path(), &["list"]);
    assert_eq!(out.lines().count(), 2);
}

#[test]
fn edit_replaces_fields() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["draft", "--tag", "a", "--color", "red"]);
    run_ok(
        tmp.path(),
        &["edit", &ts, "--content", "final", "--tag", "b", "--clear-color"],
    );

    let out = run_ok(tmp.path(), &["show", &ts, "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["content"], "final");
    assert_eq!(json["tags"], serde_json::json!(["b"]));
    assert!(json.get("color").is_none());
}

#[test]
fn edit_without_changes_fails() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["x"]);
    let (_, stderr, success) = run(tmp.path(), &["edit", &ts]);
    assert!(!success);
    assert!(stderr.contains("nothing to change"));
}

#[test]
fn delete_removes_note_and_empty_file() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["temporary"]);
    assert_eq!(day_files(tmp.path()).len(), 1);

    run_ok(tmp.path(), &["delete", &ts]);
    assert!(day_files(tmp.path()).is_empty());
    assert_eq!(run_ok(tmp.path(), &["list"]), "");

    // The deleted note is kept in the recovery log
    let out = run_ok(tmp.path(), &["recovery"]);
    assert!(out.contains(&format!("note {} deleted", ts)));
    assert!(out.contains("temporary"));
}

#[test]
fn delete_missing_note_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run(tmp.path(), &["delete", "12345"]);
    assert!(!success);
    assert!(stderr.contains("note not found: 12345"));
}

#[test]
fn swap_reorders_list() {
    let tmp = TempDir::new().unwrap();
    let a = add(tmp.path(), &["first"]);
    let b = add(tmp.path(), &["second"]);

    run_ok(tmp.path(), &["swap", &a, &b]);
    let out = run_ok(tmp.path(), &["list", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["notes"][0]["content"], "second");
    assert_eq!(json["notes"][0]["position"], 1);
    assert_eq!(json["notes"][1]["content"], "first");
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

#[test]
fn list_filters_with_query() {
    let tmp = TempDir::new().unwrap();
    add(tmp.path(), &["plumbing", "--tag", "home"]);
    add(tmp.path(), &["budget", "--tag", "work", "--label", "project/alpha"]);

    let out = run_ok(tmp.path(), &["list", "tag", "work"]);
    assert_eq!(out.lines().count(), 1);
    assert!(out.contains("budget"));

    let out = run_ok(tmp.path(), &["list", "not tag work"]);
    assert!(out.contains("plumbing"));
    assert!(!out.contains("budget"));
}

#[test]
fn list_with_bad_query_shows_everything() {
    let tmp = TempDir::new().unwrap();
    add(tmp.path(), &["one"]);
    add(tmp.path(), &["two"]);

    let (stdout, stderr, success) = run(tmp.path(), &["list", "tag"]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stderr.contains("query not applied"));
}

#[test]
fn tags_and_labels_report_counts() {
    let tmp = TempDir::new().unwrap();
    add(tmp.path(), &["a", "--tag", "x", "--label", "p/q"]);
    add(tmp.path(), &["b", "--tag", "x", "--label", "p/r"]);

    assert_eq!(run_ok(tmp.path(), &["tags"]), "x  2\n");

    let out = run_ok(tmp.path(), &["labels", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        json,
        serde_json::json!([
            {"name": "p", "count": 2},
            {"name": "p/q", "count": 1},
            {"name": "p/r", "count": 1},
        ])
    );
}

#[test]
fn show_missing_note_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run(tmp.path(), &["show", "99"]);
    assert!(!success);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn refresh_adds_index_markers_to_hand_written_files() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("2020_01_01.md"),
        "@[1577880000]\nwritten by hand\n",
    )
    .unwrap();

    let out = run_ok(tmp.path(), &["refresh", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["loaded"], 1);
    assert_eq!(json["files_written"], 1);
    assert_eq!(
        fs::read_to_string(tmp.path().join("2020_01_01.md")).unwrap(),
        "@[1577880000]\n[idx:1]\nwritten by hand\n"
    );
}

#[test]
fn dir_flag_targets_another_directory() {
    let tmp = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    let dir = other.path().to_str().unwrap();

    run_ok(tmp.path(), &["-C", dir, "add", "elsewhere"]);
    assert!(day_files(tmp.path()).is_empty());
    assert_eq!(day_files(other.path()).len(), 1);
}

#[test]
fn recovery_prune_all_empties_log() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["gone soon"]);
    run_ok(tmp.path(), &["delete", &ts]);

    assert_eq!(run_ok(tmp.path(), &["recovery", "prune", "--all"]), "pruned 1 entries\n");
    assert_eq!(run_ok(tmp.path(), &["recovery"]), "recovery log is empty\n");
}

#[test]
fn color_with_spaces_survives_and_blank_color_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["painted", "--color", "light blue"]);
    let out = run_ok(tmp.path(), &["show", &ts, "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(json["color"], "light blue");
    assert_eq!(json["content"], "painted");

    let (_, stderr, success) = run(tmp.path(), &["add", "x", "--color", "  "]);
    assert!(!success);
    assert!(stderr.contains("invalid color"));
}

#[test]
fn read_commands_leave_files_alone() {
    let tmp = TempDir::new().unwrap();
    let original = "@[1577880000]\nwritten by hand\n";
    fs::write(tmp.path().join("2020_01_01.md"), original).unwrap();

    let commands: [&[&str]; 4] = [&["list"], &["show", "1577880000"], &["tags"], &["labels"]];
    for args in commands {
        run_ok(tmp.path(), args);
    }
    assert_eq!(
        fs::read_to_string(tmp.path().join("2020_01_01.md")).unwrap(),
        original
    );
}

#[test]
fn deleted_note_with_code_block_is_recovered_whole() {
    let tmp = TempDir::new().unwrap();
    let ts = add(tmp.path(), &["steps:\n```sh\nmake install\n```\nafter the fence"]);
    run_ok(tmp.path(), &["delete", &ts]);

    let out = run_ok(tmp.path(), &["recovery", "--json"]);
    let json: serde_json::Value = serde_json::from_str(&out).unwrap();
    let text = json[0]["text"].as_str().unwrap();
    assert!(text.ends_with("```sh\nmake install\n```\nafter the fence"), "{}", text);
}
