//! Integration tests for the snapshot/restore round trip.
//!
//! These tests verify that capturing a backup document, planning a restore
//! from its serialized form, and applying every planned item onto an
//! equivalent empty environment reproduces the original storage contents.

use serde_json::{json, Value};
use stashguard::document::parse_backup;
use stashguard::ops::{apply_selection, plan_restore, produce_snapshot};
use stashguard::records::memory::CollectionSpec;
use stashguard::storage::memory::{memory_env, MemoryEnv};
use stashguard::storage::{CookieJar, KeyValueStore};

/// Seeds every storage surface of an environment with representative data.
fn seed_source(mem: &MemoryEnv) {
    mem.local.set("theme", "dark").unwrap();
    mem.local.set("unit_system", "metric").unwrap();
    mem.session.set("draft", "work in progress").unwrap();
    mem.cookies.set("sid", "abc=def").unwrap();
    mem.cookies.set("lang", "en").unwrap();

    mem.records.create_collection(
        "settings_db",
        CollectionSpec::new("profiles").key_path(json!("id")).index(
            stashguard::document::IndexDescriptor {
                name: "by_name".to_string(),
                key_path: json!("name"),
                unique: false,
                multi_entry: false,
            },
        ),
    );
    mem.records.insert(
        "settings_db",
        "profiles",
        json!(1),
        json!({"id": 1, "name": "default"}),
    );
    mem.records.insert(
        "settings_db",
        "profiles",
        json!(2),
        json!({"id": 2, "name": "compact"}),
    );
    mem.records.create_collection("settings_db", CollectionSpec::new("blobs"));
    mem.records
        .insert("settings_db", "blobs", json!("icon"), json!([1, 2, 3]));
}

fn restore_everything(raw: &str, target: &MemoryEnv) {
    let plan = plan_restore(raw, &target.env.origin).unwrap();
    assert!(!plan.origin_mismatch);
    let items: Vec<(String, Value)> = plan
        .items
        .into_iter()
        .map(|item| (item.compound_key, item.value))
        .collect();
    let report = apply_selection(&target.env, Some(&target.env.origin), &items, 5);
    assert!(report.failures.is_empty(), "failures: {:?}", report.failures);
}

#[test]
fn test_full_round_trip_preserves_all_surfaces() {
    let source = memory_env("https://example.com");
    seed_source(&source);

    let document = produce_snapshot(&source.env, chrono::Local::now()).unwrap();
    let raw = serde_json::to_string_pretty(&document).unwrap();

    let target = memory_env("https://example.com");
    restore_everything(&raw, &target);

    // Simple surfaces match exactly.
    assert_eq!(target.local.snapshot(), source.local.snapshot());
    assert_eq!(target.session.snapshot(), source.session.snapshot());
    assert_eq!(target.cookies.cookies(), source.cookies.cookies());

    // A second snapshot of the target sees the same records and schema.
    let second = produce_snapshot(&target.env, chrono::Local::now()).unwrap();
    assert_eq!(second.structured.len(), 1);
    let db = &second.structured[0];
    assert_eq!(db.name, "settings_db");
    assert_eq!(db.collections.len(), 2);

    let profiles = db.collections.iter().find(|c| c.name == "profiles").unwrap();
    assert_eq!(profiles.key_path, Some(json!("id")));
    assert_eq!(profiles.indexes.len(), 1);
    assert_eq!(profiles.indexes[0].name, "by_name");
    assert_eq!(profiles.entries.len(), 2);

    let blobs = db.collections.iter().find(|c| c.name == "blobs").unwrap();
    assert_eq!(blobs.entries.len(), 1);
    assert_eq!(blobs.entries[0].key, json!("icon"));
    assert_eq!(blobs.entries[0].value, json!([1, 2, 3]));
}

#[test]
fn test_round_trip_survives_degraded_source_reads() {
    let source = memory_env("https://example.com");
    seed_source(&source);
    // Indexed simple-store reads throw; bulk record reads are unsupported.
    source.local.fail_indexed_reads(true);
    source.records.refuse_bulk_reads("profiles");

    let document = produce_snapshot(&source.env, chrono::Local::now()).unwrap();
    let raw = serde_json::to_string(&document).unwrap();

    let target = memory_env("https://example.com");
    restore_everything(&raw, &target);

    assert_eq!(target.local.snapshot(), source.local.snapshot());
    assert_eq!(
        target.records.get("settings_db", "profiles", &json!(1)),
        Some(json!({"id": 1, "name": "default"}))
    );
}

#[test]
fn test_restored_document_parses_as_current_shape() {
    let source = memory_env("https://example.com");
    seed_source(&source);

    let document = produce_snapshot(&source.env, chrono::Local::now()).unwrap();
    let raw = serde_json::to_string(&document).unwrap();
    let reparsed = parse_backup(&raw).unwrap();

    let meta = reparsed.meta.unwrap();
    assert_eq!(meta.origin, "https://example.com");
    assert_eq!(meta.script_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(reparsed.local.len(), 2);
}

#[test]
fn test_partial_selection_restores_only_chosen_items() {
    let source = memory_env("https://example.com");
    seed_source(&source);
    let raw =
        serde_json::to_string(&produce_snapshot(&source.env, chrono::Local::now()).unwrap())
            .unwrap();

    let target = memory_env("https://example.com");
    let plan = plan_restore(&raw, "https://example.com").unwrap();
    let items: Vec<(String, Value)> = plan
        .items
        .into_iter()
        .filter(|item| item.compound_key == "localStorage:theme")
        .map(|item| (item.compound_key, item.value))
        .collect();
    assert_eq!(items.len(), 1);

    let report = apply_selection(&target.env, Some("https://example.com"), &items, 5);
    assert_eq!(report.counts.total(), 1);
    assert_eq!(target.local.get("theme").unwrap(), Some("dark".to_string()));
    assert_eq!(target.local.get("unit_system").unwrap(), None);
    assert_eq!(target.session.len(), 0);
}
