//! Restore planner.
//!
//! Turns raw uploaded JSON into a flat, uniquely-keyed list of restorable
//! items for the selection UI. Origin policy is enforced here, at planning
//! time: when the document was exported from a different origin, session and
//! cookie items are omitted from the candidate list entirely rather than
//! offered and later refused. Local and structured items are bulk data, not
//! per-origin secrets, and are always offered.

use crate::document::{
    parse_backup, structured_compound_key, RestoreItem, StorageType, StructuredRecordPayload,
};
use crate::errors::AppResult;
use serde_json::Value;
use tracing::{debug, warn};

/// The planner's output: the selectable items and the origin verdict.
#[derive(Debug, Clone)]
pub struct RestorePlan {
    /// Restorable items, one per atomic value, compound keys unique.
    pub items: Vec<RestoreItem>,
    /// Origin recorded in the document, if it carried metadata. Carried along
    /// so the apply phase can re-check the gate.
    pub document_origin: Option<String>,
    /// Whether the document's recorded origin differs from the current one.
    /// When `true`, session and cookie items have been omitted and the caller
    /// should surface one advisory notice.
    pub origin_mismatch: bool,
}

/// Parses a backup document and emits its restorable items.
///
/// Accepts both the typed and the legacy flat-map shape. Session and cookie
/// items are emitted only when the document's recorded origin is absent or
/// equals `current_origin`.
///
/// # Errors
///
/// Returns `AppError::Parse` for malformed documents; no partial plan is
/// produced.
pub fn plan_restore(raw: &str, current_origin: &str) -> AppResult<RestorePlan> {
    let document = parse_backup(raw)?;

    let origin_mismatch = document
        .meta
        .as_ref()
        .map(|meta| meta.origin != current_origin)
        .unwrap_or(false);
    if origin_mismatch {
        warn!(
            "Backup origin {:?} differs from current origin {:?}; omitting session and cookie items",
            document.meta.as_ref().map(|m| m.origin.as_str()),
            current_origin
        );
    }

    let mut items = Vec::new();

    for (key, value) in &document.local {
        items.push(RestoreItem {
            compound_key: format!("{}:{}", StorageType::Local.prefix(), key),
            storage_type: StorageType::Local,
            value: Value::String(value.clone()),
        });
    }

    if !origin_mismatch {
        for (key, value) in &document.session {
            items.push(RestoreItem {
                compound_key: format!("{}:{}", StorageType::Session.prefix(), key),
                storage_type: StorageType::Session,
                value: Value::String(value.clone()),
            });
        }
        for cookie in &document.cookies {
            items.push(RestoreItem {
                compound_key: format!("{}:{}", StorageType::Cookie.prefix(), cookie.name),
                storage_type: StorageType::Cookie,
                value: Value::String(cookie.value.clone()),
            });
        }
    }

    for database in &document.structured {
        for collection in &database.collections {
            for entry in &collection.entries {
                let payload = StructuredRecordPayload {
                    db: database.name.clone(),
                    collection: collection.name.clone(),
                    key: entry.key.clone(),
                    value: entry.value.clone(),
                    key_path: collection.key_path.clone(),
                    auto_increment: collection.auto_increment,
                    indexes: collection.indexes.clone(),
                };
                items.push(RestoreItem {
                    compound_key: structured_compound_key(
                        &database.name,
                        &collection.name,
                        &entry.key,
                    ),
                    storage_type: StorageType::Structured,
                    value: serde_json::to_value(payload)?,
                });
            }
        }
    }

    debug!("Planned {} restorable items", items.len());
    Ok(RestorePlan {
        items,
        document_origin: document.meta.map(|meta| meta.origin),
        origin_mismatch,
    })
}
