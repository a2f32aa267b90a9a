use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

// Helper function to set up a test Command instance
fn set_up_command() -> Command {
    Command::cargo_bin("stashguard").unwrap()
}

fn typed_backup() -> &'static str {
    r#"{
        "meta": {"exportedAt": "2024-05-01T10:00:00+00:00", "origin": "https://a.example", "scriptVersion": "0.3.0"},
        "localStoreEntries": {"theme": "dark", "unit_system": "metric"},
        "sessionStoreEntries": {"draft": "wip"},
        "cookies": [{"name": "sid", "value": "abc"}],
        "structuredStores": [{
            "name": "settings_db",
            "version": 1,
            "collections": [{"name": "profiles", "entries": [{"key": 1, "value": {"id": 1}}]}]
        }]
    }"#
}

#[test]
fn test_cli_no_args_shows_usage() {
    let mut cmd = set_up_command();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_inspect_typed_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");
    fs::write(&path, typed_backup()).unwrap();

    let mut cmd = set_up_command();
    cmd.arg("inspect").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("https://a.example"))
        .stdout(predicate::str::contains("local entries:   2"))
        .stdout(predicate::str::contains("session entries: 1"))
        .stdout(predicate::str::contains("cookies:         1"))
        .stdout(predicate::str::contains("1 record(s)"));
}

#[test]
fn test_inspect_legacy_document() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("old.json");
    fs::write(&path, r#"{"k1": "v1", "k2": "v2"}"#).unwrap();

    let mut cmd = set_up_command();
    cmd.arg("inspect").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("legacy document"))
        .stdout(predicate::str::contains("local entries:   2"));
}

#[test]
fn test_plan_lists_compound_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");
    fs::write(&path, typed_backup()).unwrap();

    let mut cmd = set_up_command();
    cmd.arg("plan").arg(&path).arg("--origin").arg("https://a.example");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("localStorage:theme"))
        .stdout(predicate::str::contains("sessionStorage:draft"))
        .stdout(predicate::str::contains("cookie:sid"))
        .stdout(predicate::str::contains("indexedDB:settings_db:profiles:1"));
}

#[test]
fn test_plan_on_other_origin_omits_session_and_cookie_items() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("backup.json");
    fs::write(&path, typed_backup()).unwrap();

    let mut cmd = set_up_command();
    cmd.arg("plan").arg(&path).arg("-o").arg("https://b.example");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("differs"))
        .stdout(predicate::str::contains("localStorage:theme"))
        .stdout(predicate::str::contains("sessionStorage:draft").not())
        .stdout(predicate::str::contains("cookie:sid").not());
}

#[test]
fn test_convert_upgrades_legacy_document() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("old.json");
    let output = dir.path().join("new.json");
    fs::write(&input, r#"{"theme": "dark", "count": 3}"#).unwrap();

    let mut cmd = set_up_command();
    cmd.arg("convert").arg(&input).arg("-o").arg(&output);
    cmd.assert().success();

    let converted = fs::read_to_string(&output).unwrap();
    assert!(converted.contains("\"localStoreEntries\""));
    assert!(converted.contains("\"theme\": \"dark\""));
    // Legacy non-string values are carried as their JSON text.
    assert!(converted.contains("\"count\": \"3\""));
}

#[test]
fn test_missing_file_fails_cleanly() {
    let mut cmd = set_up_command();
    cmd.arg("inspect").arg("/nonexistent/backup.json");
    cmd.assert().failure();
}

#[test]
fn test_malformed_document_fails_with_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{broken").unwrap();

    let mut cmd = set_up_command();
    cmd.arg("inspect").arg(&path);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("JSON"));
}
