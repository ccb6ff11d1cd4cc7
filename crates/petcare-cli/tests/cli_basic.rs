//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data dir.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_petcare-cli"))
        .args(args)
        .env("PETCARE_DATA_DIR", dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout is not JSON")
}

fn pet_id(dir: &Path, name: &str) -> i64 {
    let pets = run_json(dir, &["pet", "list"]);
    pets.as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == name)
        .and_then(|p| p["id"].as_i64())
        .unwrap_or_else(|| panic!("{name} not listed"))
}

#[test]
fn test_first_run_lists_starter_roster() {
    let dir = TempDir::new().unwrap();
    let pets = run_json(dir.path(), &["pet", "list"]);
    let pets = pets.as_array().unwrap();
    assert_eq!(pets.len(), 11);
    assert_eq!(pets[0]["name"], "Chamametchi");
    assert!(pets.iter().all(|p| p["is_adopted"] == false));

    // A second run must not reseed.
    let again = run_json(dir.path(), &["pet", "list"]);
    assert_eq!(again.as_array().unwrap().len(), 11);
}

#[test]
fn test_list_sorted_by_age() {
    let dir = TempDir::new().unwrap();
    let pets = run_json(dir.path(), &["pet", "list", "--sort", "age"]);
    let ages: Vec<i64> = pets
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["age"].as_i64().unwrap())
        .collect();
    assert!(ages.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(ages.last(), Some(&21));
}

#[test]
fn test_adopt_and_play() {
    let dir = TempDir::new().unwrap();
    let id = pet_id(dir.path(), "Mametchi");

    let adopted = run_json(dir.path(), &["pet", "adopt", &id.to_string()]);
    assert_eq!(adopted["is_adopted"], true);

    let played = run_json(dir.path(), &["pet", "play", &id.to_string()]);
    assert_eq!(played["happy_meter"], 6);
    assert_eq!(played["is_adopted"], true);

    let owned = run_json(dir.path(), &["pet", "list", "--adopted"]);
    assert_eq!(owned.as_array().unwrap().len(), 1);
    let available = run_json(dir.path(), &["pet", "list", "--available"]);
    assert_eq!(available.as_array().unwrap().len(), 10);
}

#[test]
fn test_feed_clamps_at_ten() {
    let dir = TempDir::new().unwrap();
    let id = pet_id(dir.path(), "Chamametchi").to_string();
    let mut last = Value::Null;
    for _ in 0..4 {
        last = run_json(dir.path(), &["pet", "feed", &id]);
    }
    assert_eq!(last["hunger_meter"], 10);
}

#[test]
fn test_add_pet() {
    let dir = TempDir::new().unwrap();
    let added = run_json(dir.path(), &["pet", "add", "Kuchipatchi", "--age", "4"]);
    assert_eq!(added["name"], "Kuchipatchi");
    assert_eq!(added["age"], 4);
    assert_eq!(added["hunger_meter"], 5);
    assert_eq!(added["is_adopted"], false);

    let pets = run_json(dir.path(), &["pet", "list"]);
    assert_eq!(pets.as_array().unwrap().len(), 12);

    // Same name again is a second pet, and the new row is the one returned.
    let second = run_json(dir.path(), &["pet", "add", "Kuchipatchi", "--age", "2"]);
    assert_ne!(second["id"], added["id"]);
    assert_eq!(second["age"], 2);
}

#[test]
fn test_add_pet_rejects_bad_age() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["pet", "add", "Kuchipatchi", "--age", "old"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_show_unknown_pet_fails() {
    let dir = TempDir::new().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["pet", "show", "999"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("pet not found: 999"));
}

#[test]
fn test_decay_then_notify() {
    let dir = TempDir::new().unwrap();
    let id = pet_id(dir.path(), "Hapihapitchi").to_string();
    run_json(dir.path(), &["pet", "adopt", &id]);
    for _ in 0..2 {
        run_json(dir.path(), &["pet", "decay"]);
    }

    let (stdout, stderr, code) = run_cli(dir.path(), &["notify", "run"]);
    assert_eq!(code, 0, "{stderr}");
    let alerts: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["body"], "Hapihapitchi is craving a cinnamon bun!");

    // Already alerted for this occurrence.
    let (stdout, _, code) = run_cli(dir.path(), &["notify", "run"]);
    assert_eq!(code, 0);
    assert!(stdout.trim().is_empty());
}

#[test]
fn test_config_set_and_get() {
    let dir = TempDir::new().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "set", "decay.interval_secs", "30"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "decay.interval_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "30");

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "decay.nope"]);
    assert_eq!(code, 1);
}

#[test]
fn test_default_sort_from_config() {
    let dir = TempDir::new().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "ui.default_sort", "AGE"]);
    assert_eq!(code, 0);

    let pets = run_json(dir.path(), &["pet", "list"]);
    assert_eq!(pets[0]["name"], "Mimitchi");
}
