//! CLI command integration tests.
//! Scripts and snapshots live in a temp directory per test.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const SCRIPT: &str = r#"{"events": [
    {"at": 0, "type": "open", "input": "main"},
    {"at": 0, "type": "type", "input": "main", "text": "Boats drift past the harbour wall."},
    {"at": 500, "type": "type", "input": "main", "text": "Boats drift past the harbour wall. Boats drift past the harbour wall."},
    {"at": 1200, "type": "pin", "thought": 0},
    {"at": 1300, "type": "remember", "kind": "LONG_TERM", "text": "likes the sea"},
    {"at": 1400, "type": "articulate"}
]}"#;

fn tc_cmd() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("tcanvas").unwrap();
    cmd.env_remove("TCANVAS_CONFIG");
    cmd
}

fn write_script(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("script.json");
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn config_prints_defaults() {
    tc_cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_thought_count = 5"))
        .stdout(predicate::str::contains("[lifecycle.trigger]"))
        .stdout(predicate::str::contains("[canvas]"));
}

#[test]
fn config_file_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tcanvas.toml");
    std::fs::write(&path, "[lifecycle]\nmax_thought_count = 9\n").unwrap();
    tc_cmd()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("max_thought_count = 9"));
}

#[test]
fn invalid_config_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tcanvas.toml");
    std::fs::write(&path, "[lifecycle]\nmax_thought_count = 0\n").unwrap();
    tc_cmd()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn replay_merges_repeated_sentence() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, SCRIPT);
    tc_cmd()
        .arg("replay")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("SENTENCE_END inserted thought #0"))
        .stdout(predicate::str::contains("SENTENCE_END merged into thought #0"))
        .stdout(predicate::str::contains("generations=2 inserted=1 merged=1"))
        .stdout(predicate::str::contains("[pinned]"))
        .stdout(predicate::str::contains("articulation: Putting it together:"));
}

#[test]
fn replay_json_report() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, SCRIPT);
    let output = tc_cmd()
        .arg("replay")
        .arg(&script)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["inserted"], 1);
    assert_eq!(report["merged"], 1);
    assert_eq!(report["thoughts"].as_array().unwrap().len(), 1);
    assert_eq!(report["nodes"].as_array().unwrap().len(), 2);
}

#[test]
fn replay_snapshot_then_inspect() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, SCRIPT);
    let snapshot = dir.path().join("session.json");
    tc_cmd()
        .arg("replay")
        .arg(&script)
        .arg("--out")
        .arg(&snapshot)
        .assert()
        .success();
    assert!(snapshot.exists());

    tc_cmd()
        .arg("inspect")
        .arg(&snapshot)
        .assert()
        .success()
        .stdout(predicate::str::contains("thoughts:   1 (1 pinned)"))
        .stdout(predicate::str::contains("inputs:     1"))
        .stdout(predicate::str::contains("memory:     1 long-term, 0 short-term"));
}

#[test]
fn replay_bad_reference_fails() {
    let dir = TempDir::new().unwrap();
    let script = write_script(&dir, r#"{"events": [{"at": 0, "type": "like", "thought": 2}]}"#);
    tc_cmd()
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("thought #2"));
}

#[test]
fn replay_missing_script_fails() {
    tc_cmd()
        .args(["replay", "/nonexistent/script.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load"));
}

#[test]
fn layout_places_without_overlap() {
    let output = tc_cmd()
        .args(["layout", "--count", "4", "--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let placed: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(placed.len(), 4);
    assert_eq!(placed[0]["strategy"], "empty");
    for p in &placed[1..] {
        assert_eq!(p["overlap"], 0.0);
        assert_eq!(p["strategy"], "grid");
    }
}

#[test]
fn layout_is_seeded() {
    let run = || {
        tc_cmd()
            .args(["layout", "--count", "3", "--side", "left", "--seed", "3"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn layout_rejects_unknown_side() {
    tc_cmd()
        .args(["layout", "--count", "1", "--side", "middle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown side"));
}

#[test]
fn layout_rejects_unbounded_sizes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tcanvas.toml");
    std::fs::write(&path, "[lifecycle.layout]\njitter = inf\n").unwrap();
    tc_cmd()
        .args(["layout", "--count", "2", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"))
        .stderr(predicate::str::contains("panicked").not());

    tc_cmd()
        .args(["layout", "--count", "2", "--width", "inf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid canvas size"))
        .stderr(predicate::str::contains("panicked").not());
}
