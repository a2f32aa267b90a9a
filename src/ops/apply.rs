//! Apply engine.
//!
//! Writes a user-selected item list back into the correct storage surface,
//! dispatching on each compound key's type prefix. Every item is attempted;
//! one item's failure never aborts the batch. Session and cookie items are
//! re-gated here against the imported document's recorded origin, as defense
//! in depth beyond the planner's filtering.

use crate::constants::{PREFIX_COOKIE, PREFIX_LOCAL, PREFIX_SESSION, PREFIX_STRUCTURED};
use crate::document::{split_compound_key, value_to_plain_string, StructuredRecordPayload};
use crate::records::write_record;
use crate::storage::HostEnv;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Successful writes per storage type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyCounts {
    /// Local-store writes that succeeded.
    pub local: usize,
    /// Session-store writes that succeeded.
    pub session: usize,
    /// Cookie writes that succeeded.
    pub cookie: usize,
    /// Structured-record writes that succeeded.
    pub structured: usize,
}

impl ApplyCounts {
    /// Total successful writes across all storage types.
    pub fn total(&self) -> usize {
        self.local + self.session + self.cookie + self.structured
    }
}

/// Outcome of one apply batch: success tallies and a bounded failure list.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Successful writes per storage type.
    pub counts: ApplyCounts,
    /// Failure messages, at most the configured cap of them verbatim plus one
    /// overflow note naming how many more failed.
    pub failures: Vec<String>,
}

/// Applies a selected `(compound key, value)` list to live storage.
///
/// `document_origin` is the origin recorded in the originally imported
/// document; session and cookie items are refused when it is present and
/// differs from the environment's origin. A missing or unknown type prefix
/// falls through to the local store with the full key.
pub fn apply_selection(
    env: &HostEnv,
    document_origin: Option<&str>,
    items: &[(String, Value)],
    failure_cap: usize,
) -> ApplyReport {
    let mut counts = ApplyCounts::default();
    let mut failures = Vec::new();
    let origin_allowed =
        document_origin.map(|origin| origin == env.origin).unwrap_or(true);

    for (compound_key, value) in items {
        let result = apply_one(env, origin_allowed, compound_key, value, &mut counts);
        if let Err(message) = result {
            warn!("Item '{}' failed: {}", compound_key, message);
            failures.push(format!("{}: {}", compound_key, message));
        }
    }

    info!(
        "Applied {} item(s), {} failed",
        counts.total(),
        failures.len()
    );

    ApplyReport {
        counts,
        failures: bound_failures(failures, failure_cap),
    }
}

fn apply_one(
    env: &HostEnv,
    origin_allowed: bool,
    compound_key: &str,
    value: &Value,
    counts: &mut ApplyCounts,
) -> Result<(), String> {
    match split_compound_key(compound_key) {
        (Some(PREFIX_LOCAL), key) => {
            env.local
                .set(key, &value_to_plain_string(value))
                .map_err(|e| e.to_string())?;
            counts.local += 1;
        }
        (Some(PREFIX_SESSION), key) => {
            if !origin_allowed {
                return Err("session item refused: backup origin differs".to_string());
            }
            env.session
                .set(key, &value_to_plain_string(value))
                .map_err(|e| e.to_string())?;
            counts.session += 1;
        }
        (Some(PREFIX_COOKIE), name) => {
            if !origin_allowed {
                return Err("cookie refused: backup origin differs".to_string());
            }
            env.cookies
                .set(name, &value_to_plain_string(value))
                .map_err(|e| e.to_string())?;
            counts.cookie += 1;
        }
        (Some(PREFIX_STRUCTURED), _) => {
            let payload: StructuredRecordPayload = serde_json::from_value(value.clone())
                .map_err(|e| format!("malformed record payload: {}", e))?;
            write_record(env.records.as_ref(), &payload).map_err(|e| e.to_string())?;
            counts.structured += 1;
        }
        // No recognizable prefix: treat the whole key as a local-store key.
        _ => {
            debug!(
                "No type prefix on '{}', defaulting to local store",
                compound_key
            );
            env.local
                .set(compound_key, &value_to_plain_string(value))
                .map_err(|e| e.to_string())?;
            counts.local += 1;
        }
    }
    Ok(())
}

fn bound_failures(failures: Vec<String>, cap: usize) -> Vec<String> {
    if failures.len() <= cap {
        return failures;
    }
    let overflow = failures.len() - cap;
    let mut bounded: Vec<String> = failures.into_iter().take(cap).collect();
    bounded.push(format!("...and {} more item(s) failed", overflow));
    bounded
}
