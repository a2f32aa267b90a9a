//! Snapshot builder.
//!
//! Assembles the two simple stores, cookies, and every structured-record
//! database into one backup document. Simple-store capture walks
//! `0..length-1` through the captured native accessors and falls back to a
//! key-enumeration read when the indexed path throws; the fallback order is
//! an explicit strategy list, not nested handlers.

use crate::constants::{BACKUP_FILENAME_PREFIX, BACKUP_FILE_EXTENSION};
use crate::document::{BackupDocument, BackupMeta, CookieEntry};
use crate::errors::{AppResult, StoreError};
use crate::records::enumerate_databases;
use crate::storage::{capture_local_accessors, HostEnv, KeyValueStore};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Captures a backup document covering all four storage surfaces.
///
/// Cookies and the simple stores are read synchronously; structured stores go
/// through the enumerator, which degrades to an empty capture when discovery
/// is unavailable.
///
/// # Errors
///
/// Returns a store error only when both the indexed and the enumeration read
/// of a simple store fail.
pub fn produce_snapshot(env: &HostEnv, now: DateTime<Local>) -> AppResult<BackupDocument> {
    info!("Capturing snapshot for origin {}", env.origin);

    let captured = capture_local_accessors(env.hooks.as_ref(), Rc::clone(&env.local));
    let local = read_simple_store(captured.store.as_ref())?;
    let session = read_simple_store(env.session.as_ref())?;
    let cookies = parse_cookie_string(&env.cookies.cookie_string());
    let structured = enumerate_databases(env.records.as_ref());

    debug!(
        "Captured {} local, {} session, {} cookie entries, {} databases",
        local.len(),
        session.len(),
        cookies.len(),
        structured.len()
    );

    Ok(BackupDocument {
        meta: Some(BackupMeta {
            exported_at: now.to_rfc3339(),
            origin: env.origin.clone(),
            script_version: env!("CARGO_PKG_VERSION").to_string(),
        }),
        local,
        session,
        cookies,
        structured,
    })
}

/// Reads every entry of a simple store.
///
/// Strategies, in order: indexed walk via `key_at`/`get` (the native accessor
/// path), then bulk key enumeration. The first to succeed wins.
fn read_simple_store(store: &dyn KeyValueStore) -> Result<BTreeMap<String, String>, StoreError> {
    match read_indexed(store) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            warn!("Indexed store read failed, trying enumeration: {}", e);
            read_enumerated(store)
        }
    }
}

fn read_indexed(store: &dyn KeyValueStore) -> Result<BTreeMap<String, String>, StoreError> {
    let mut entries = BTreeMap::new();
    for index in 0..store.len() {
        if let Some(key) = store.key_at(index)? {
            if let Some(value) = store.get(&key)? {
                entries.insert(key, value);
            }
        }
    }
    Ok(entries)
}

fn read_enumerated(store: &dyn KeyValueStore) -> Result<BTreeMap<String, String>, StoreError> {
    let mut entries = BTreeMap::new();
    for key in store.keys()? {
        if let Some(value) = store.get(&key)? {
            entries.insert(key, value);
        }
    }
    Ok(entries)
}

/// Parses a `;`-separated cookie string into named entries.
///
/// Each trimmed pair is split on its first `=`, so `=` inside the value
/// survives. Entries with an empty name are dropped.
pub fn parse_cookie_string(raw: &str) -> Vec<CookieEntry> {
    raw.split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (name, value) = match pair.split_once('=') {
                Some((name, value)) => (name.trim(), value),
                None => (pair, ""),
            };
            if name.is_empty() {
                return None;
            }
            Some(CookieEntry {
                name: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

/// Builds the timestamped download filename for a snapshot.
///
/// The timestamp is the ISO 8601 rendering of `now` with `:` and `.` replaced
/// by `-`, which keeps filenames sortable and filesystem-safe.
pub fn backup_filename(now: DateTime<Local>) -> String {
    let stamp: String = now
        .to_rfc3339()
        .chars()
        .map(|c| if c == ':' || c == '.' { '-' } else { c })
        .collect();
    format!("{}{}{}", BACKUP_FILENAME_PREFIX, stamp, BACKUP_FILE_EXTENSION)
}

/// Serializes a backup document, pretty-printed, to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
pub fn write_snapshot(document: &BackupDocument, path: &Path) -> AppResult<()> {
    let raw = serde_json::to_string_pretty(document)?;
    fs::write(path, raw)?;
    info!("Wrote snapshot to {:?}", path);
    Ok(())
}
