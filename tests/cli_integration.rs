//! Integration tests for the `waypoint` CLI.
//!
//! Each test initializes a store in a temp directory, runs `waypoint` as a
//! subprocess and checks stdout and the JSON records on disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Get the path to the built `waypoint` binary.
fn waypoint_bin() -> PathBuf {
    // cargo test builds to target/debug/
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("waypoint");
    path
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(waypoint_bin())
        .args(args)
        .current_dir(dir)
        .env("WAYPOINT_HOME", dir.join("global-home"))
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run waypoint")
}

fn run_ok(dir: &Path, args: &[&str]) -> String {
    let output = run(dir, args);
    assert!(
        output.status.success(),
        "waypoint {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

/// Pulls the id out of "Added project abc123 (Launch)".
fn id_after(stdout: &str, prefix: &str) -> String {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_else(|| panic!("no {:?} in output: {}", prefix, stdout))
        .to_string()
}

fn setup() -> (TempDir, String) {
    let tmp = TempDir::new().unwrap();
    let out = run_ok(tmp.path(), &["init"]);
    assert!(out.contains("Initialized milestone store"));
    let out = run_ok(tmp.path(), &["project", "add", "Launch"]);
    let project = id_after(&out, "Added project ");
    (tmp, project)
}

fn add_milestone(dir: &Path, args: &[&str]) -> String {
    let mut full = vec!["add"];
    full.extend_from_slice(args);
    let out = run_ok(dir, &full);
    id_after(&out, "Added milestone ")
}

#[test]
fn init_creates_empty_records() {
    let tmp = TempDir::new().unwrap();
    run_ok(tmp.path(), &["init"]);
    let store = tmp.path().join(".waypoint");
    assert_eq!(fs::read_to_string(store.join("projects.json")).unwrap().trim(), "[]");
    assert_eq!(fs::read_to_string(store.join("milestones.json")).unwrap().trim(), "[]");
    assert!(store.join("config.yml").exists());
}

#[test]
fn add_clamps_end_and_persists_camel_case() {
    let (tmp, project) = setup();
    let out = run_ok(
        tmp.path(),
        &[
            "add", "Kickoff", "-p", "Launch", "--start", "2025-03-05", "--end", "2025-03-01",
        ],
    );
    assert!(out.contains("(1 day)"), "{}", out);

    let raw = fs::read_to_string(tmp.path().join(".waypoint/milestones.json")).unwrap();
    let records: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let first = &records[0];
    assert_eq!(first["title"], "Kickoff");
    assert_eq!(first["date"], "2025-03-05");
    assert_eq!(first["endDate"], "2025-03-05");
    assert_eq!(first["projectId"], project.as_str());
}

#[test]
fn blank_title_is_rejected() {
    let (tmp, _) = setup();
    let output = run(tmp.path(), &["add", "   ", "-p", "Launch", "--start", "2025-03-05"]);
    assert!(!output.status.success());
    let out = run_ok(tmp.path(), &["list"]);
    assert!(out.contains("(no milestones)"));
}

#[test]
fn list_filters_by_canonical_label() {
    let (tmp, _) = setup();
    add_milestone(
        tmp.path(),
        &["Beta", "-p", "Launch", "--start", "2025-03-10", "-l", "Risk Item"],
    );
    add_milestone(tmp.path(), &["Docs", "-p", "Launch", "--start", "2025-03-12"]);

    let out = run_ok(tmp.path(), &["list", "--label", "RISK   item"]);
    assert!(out.contains("Beta"));
    assert!(!out.contains("Docs"));
    assert!(out.contains("labels: risk-item"));

    let out = run_ok(tmp.path(), &["labels"]);
    assert_eq!(out.trim(), "risk-item (1)");
}

#[test]
fn edit_rejects_label_and_clear_labels_together() {
    let (tmp, _) = setup();
    let id = add_milestone(
        tmp.path(),
        &["Beta", "-p", "Launch", "--start", "2025-03-10", "-l", "risk"],
    );
    let output = run(tmp.path(), &["edit", &id, "--label", "ui", "--clear-labels"]);
    assert!(!output.status.success());
    let output = run(tmp.path(), &["edit", &id, "--end", "2025-03-12", "--clear-end"]);
    assert!(!output.status.success());

    let out = run_ok(tmp.path(), &["list"]);
    assert!(out.contains("labels: risk"), "{}", out);
    assert!(!out.contains("2025-03-10..2025-03-12"));

    run_ok(tmp.path(), &["edit", &id, "--clear-labels"]);
    let out = run_ok(tmp.path(), &["list"]);
    assert!(!out.contains("labels:"), "{}", out);
}

#[test]
fn move_keeps_duration() {
    let (tmp, _) = setup();
    let id = add_milestone(
        tmp.path(),
        &["Beta", "-p", "Launch", "--start", "2025-03-05", "--end", "2025-03-10"],
    );
    let out = run_ok(tmp.path(), &["move", &id, "2025-03-20"]);
    assert!(out.contains("2025-03-20..2025-03-25"), "{}", out);
}

#[test]
fn calendar_lists_spanning_milestone_per_day() {
    let (tmp, _) = setup();
    add_milestone(
        tmp.path(),
        &["Beta", "-p", "Launch", "--start", "2025-03-30", "--end", "2025-04-02"],
    );
    let out = run_ok(tmp.path(), &["calendar", "--month", "2025-03"]);
    assert!(out.starts_with("March 2025"));
    assert!(out.contains("2025-03-30  Beta"));
    assert!(out.contains("2025-03-31  Beta"));
    // April 1 and 2 are shown in the trailing week of the grid.
    assert!(out.contains("2025-04-02  Beta"));
    assert!(!out.contains("2025-04-03  Beta"));
}

#[test]
fn timeline_clips_bar_to_month() {
    let (tmp, _) = setup();
    add_milestone(
        tmp.path(),
        &["Beta", "-p", "Launch", "--start", "2025-03-28", "--end", "2025-04-05"],
    );
    let out = run_ok(tmp.path(), &["timeline", "--month", "2025-03"]);
    assert!(out.contains("Launch ["));
    assert!(out.contains("28-31 Beta"), "{}", out);

    let out = run_ok(tmp.path(), &["timeline", "--month", "2025-05"]);
    assert!(out.contains("(nothing this month)"));
}

#[test]
fn deleting_project_cascades() {
    let (tmp, _) = setup();
    let out = run_ok(tmp.path(), &["project", "add", "Docs"]);
    let docs = id_after(&out, "Added project ");
    add_milestone(tmp.path(), &["Kickoff", "-p", "Launch", "--start", "2025-03-01"]);
    add_milestone(tmp.path(), &["Guide", "-p", &docs, "--start", "2025-03-02"]);
    add_milestone(tmp.path(), &["Review", "-p", &docs, "--start", "2025-03-03"]);

    let out = run_ok(tmp.path(), &["project", "delete", "docs"]);
    assert!(out.contains("and 2 milestone(s)"), "{}", out);

    let out = run_ok(tmp.path(), &["list"]);
    assert!(out.contains("Kickoff"));
    assert!(!out.contains("Guide"));
    assert!(!out.contains("Review"));
}

#[test]
fn corrupt_record_loads_as_empty() {
    let (tmp, _) = setup();
    fs::write(tmp.path().join(".waypoint/milestones.json"), "{not json").unwrap();
    let out = run_ok(tmp.path(), &["list"]);
    assert!(out.contains("(no milestones)"));
    let out = run_ok(tmp.path(), &["project", "list"]);
    assert!(out.contains("Launch"));
}

#[test]
fn falls_back_to_global_store() {
    let tmp = TempDir::new().unwrap();
    let out = run_ok(tmp.path(), &["project", "add", "Solo"]);
    assert!(out.contains("Added project"));
    assert!(tmp.path().join("global-home/projects.json").exists());
    let out = run_ok(tmp.path(), &["project", "list"]);
    assert!(out.contains("(global)"));
}
