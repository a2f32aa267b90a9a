//! Backup document data model.
//!
//! This module defines the portable JSON shape a snapshot serializes to and a
//! restore parses from: one document carrying the two simple key-value stores,
//! cookies, and every structured-record database for the origin, plus export
//! metadata. Two shapes must parse:
//!
//! - the typed shape (`meta` + per-storage-type sections), and
//! - the legacy shape: a flat string-to-string map of local-store entries,
//!   the format the very first release exported.
//!
//! Field names on the wire are the original camelCase names so documents are
//! interchangeable with previously exported files.

use crate::constants::{PREFIX_COOKIE, PREFIX_LOCAL, PREFIX_SESSION, PREFIX_STRUCTURED};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Export metadata recorded in every typed backup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMeta {
    /// RFC3339 timestamp of the export.
    #[serde(rename = "exportedAt")]
    pub exported_at: String,
    /// Origin the backup was taken from.
    pub origin: String,
    /// Version of the exporting tool.
    #[serde(rename = "scriptVersion")]
    pub script_version: String,
}

/// A single captured cookie. Order is preserved from the cookie string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    /// Cookie name.
    pub name: String,
    /// Cookie value, with any embedded `=` intact.
    pub value: String,
}

/// Descriptor of a secondary index on a record collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// Index name.
    pub name: String,
    /// Key path the index is built over (a string or an array of strings).
    #[serde(rename = "keyPath")]
    pub key_path: Value,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Whether array-valued keys index each element separately.
    #[serde(rename = "multiEntry", default)]
    pub multi_entry: bool,
}

/// One key/value record captured from a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordEntry {
    /// Record key as the engine reported it.
    pub key: Value,
    /// Record value.
    pub value: Value,
}

/// Full capture of one named record collection, schema included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionBackup {
    /// Collection name.
    pub name: String,
    /// In-line key path, if the collection has one.
    #[serde(rename = "keyPath", default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<Value>,
    /// Whether keys are generated by the engine.
    #[serde(rename = "autoIncrement", default)]
    pub auto_increment: bool,
    /// Secondary index descriptors, enough to recreate them on restore.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    /// Every record in the collection.
    #[serde(default)]
    pub entries: Vec<RecordEntry>,
}

/// Full capture of one structured-record database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseBackup {
    /// Database name.
    pub name: String,
    /// Schema version at capture time.
    pub version: u64,
    /// All named collections in the database.
    #[serde(alias = "stores", default)]
    pub collections: Vec<CollectionBackup>,
}

/// One portable backup document covering all four storage systems.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BackupDocument {
    /// Export metadata. Absent on documents converted from the legacy shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<BackupMeta>,

    /// Local-store entries.
    #[serde(rename = "localStoreEntries", alias = "localStorage", default)]
    pub local: BTreeMap<String, String>,

    /// Session-store entries.
    #[serde(rename = "sessionStoreEntries", alias = "sessionStorage", default)]
    pub session: BTreeMap<String, String>,

    /// Cookies, in capture order.
    #[serde(default)]
    pub cookies: Vec<CookieEntry>,

    /// Structured-record databases.
    #[serde(rename = "structuredStores", alias = "indexedDB", default)]
    pub structured: Vec<DatabaseBackup>,
}

/// The storage system a restorable item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    /// Persistent simple key-value store.
    Local,
    /// Same-session simple key-value store.
    Session,
    /// Cookie.
    Cookie,
    /// Structured-record store.
    Structured,
}

impl StorageType {
    /// The compound-key prefix naming this storage type.
    pub fn prefix(self) -> &'static str {
        match self {
            StorageType::Local => PREFIX_LOCAL,
            StorageType::Session => PREFIX_SESSION,
            StorageType::Cookie => PREFIX_COOKIE,
            StorageType::Structured => PREFIX_STRUCTURED,
        }
    }
}

/// Everything needed to rewrite one structured record, including the schema
/// to recreate its collection if the target database no longer has it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredRecordPayload {
    /// Database name.
    pub db: String,
    /// Collection name.
    pub collection: String,
    /// Record key.
    pub key: Value,
    /// Record value.
    pub value: Value,
    /// Collection key path, if any.
    #[serde(rename = "keyPath", default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<Value>,
    /// Collection auto-increment flag.
    #[serde(rename = "autoIncrement", default)]
    pub auto_increment: bool,
    /// Indexes to recreate if the collection is missing.
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

/// One atomic restorable value, uniquely keyed across all storage types.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreItem {
    /// Type-prefixed identifier, unique within one parsed document.
    pub compound_key: String,
    /// Which storage system the item came from.
    pub storage_type: StorageType,
    /// The value to apply: a JSON string for the simple types, a serialized
    /// [`StructuredRecordPayload`] for structured records.
    pub value: Value,
}

/// Builds the compound key for a structured record.
///
/// The record key is embedded in JSON-serialized form, so records sharing a
/// raw key across collections or databases never collide.
pub fn structured_compound_key(db: &str, collection: &str, key: &Value) -> String {
    format!("{}:{}:{}:{}", PREFIX_STRUCTURED, db, collection, key)
}

/// Splits a compound key into its type prefix and remainder.
///
/// Returns `None` for the prefix when the key has no `:` separator at all;
/// the apply engine treats that case as a bare local-store key.
pub fn split_compound_key(compound: &str) -> (Option<&str>, &str) {
    match compound.split_once(':') {
        Some((prefix, rest)) => (Some(prefix), rest),
        None => (None, compound),
    }
}

/// Renders a JSON value the way the simple stores expect: strings verbatim,
/// anything else as its JSON text.
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parses raw backup JSON into a [`BackupDocument`], accepting both shapes.
///
/// A top-level object carrying any of the typed sections (current or legacy
/// field names) is deserialized as a typed document. Any other top-level
/// object is treated as the legacy flat map: every key becomes a local-store
/// entry, with non-string values rendered as their JSON text.
///
/// # Errors
///
/// Returns `AppError::Parse` if the input is not JSON or the top level is not
/// an object. No partial state is produced on error.
pub fn parse_backup(raw: &str) -> AppResult<BackupDocument> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| AppError::Parse(format!("invalid JSON: {}", e)))?;

    let object = match value {
        Value::Object(map) => map,
        other => {
            return Err(AppError::Parse(format!(
                "expected a JSON object at the top level, found {}",
                json_type_name(&other)
            )))
        }
    };

    const TYPED_FIELDS: &[&str] = &[
        "meta",
        "localStoreEntries",
        "sessionStoreEntries",
        "cookies",
        "structuredStores",
        "localStorage",
        "sessionStorage",
        "indexedDB",
    ];
    let is_typed = TYPED_FIELDS.iter().any(|f| object.contains_key(*f));

    if is_typed {
        serde_json::from_value(Value::Object(object))
            .map_err(|e| AppError::Parse(format!("malformed backup document: {}", e)))
    } else {
        let mut local = BTreeMap::new();
        for (key, value) in object {
            local.insert(key, value_to_plain_string(&value));
        }
        Ok(BackupDocument {
            local,
            ..BackupDocument::default()
        })
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
