//! Schema-aware structured-record writer.
//!
//! Writing a restored record must work even when the target collection no
//! longer exists, so the writer is a two-phase open: try the collection
//! directly, and on a miss run [`ensure_schema`], a version-bumping reopen
//! that recreates the collection (and, best-effort, its indexes) from the
//! schema recorded in the backup, before retrying the write. Schema
//! alterations are only ever triggered by a missing collection, never by a
//! plain write.

use super::{RecordCollection, RecordDatabase, RecordStoreHost};
use crate::document::StructuredRecordPayload;
use crate::errors::RecordStoreError;
use std::rc::Rc;
use tracing::{debug, warn};

/// Writes one restored record, recreating its collection if needed.
///
/// # Errors
///
/// Returns the underlying engine error if the open, upgrade, or write fails.
/// Individual index-creation failures during schema recreation are tolerated;
/// a failed data write is not.
pub fn write_record(
    host: &dyn RecordStoreHost,
    payload: &StructuredRecordPayload,
) -> Result<(), RecordStoreError> {
    let db = host.open(&payload.db)?;

    let db = if db
        .collection_names()
        .iter()
        .any(|name| name == &payload.collection)
    {
        db
    } else {
        debug!(
            "Collection '{}/{}' missing, recreating schema",
            payload.db, payload.collection
        );
        db.close();
        ensure_schema(host, payload)?
    };

    let result = put_payload(db.as_ref(), payload);
    db.close();
    result
}

/// Reopens the payload's database at `current version + 1`, creating the
/// target collection with the recorded keyPath/auto-increment flags and
/// recreating each recorded index inside the upgrade step.
///
/// Index-creation failures are logged and skipped: partial index recreation
/// is acceptable, a missing collection is not.
///
/// # Errors
///
/// Returns the engine error if the upgrade open or the collection creation
/// itself fails.
pub fn ensure_schema(
    host: &dyn RecordStoreHost,
    payload: &StructuredRecordPayload,
) -> Result<Rc<dyn RecordDatabase>, RecordStoreError> {
    let current = {
        let db = host.open(&payload.db)?;
        let version = db.version();
        db.close();
        version
    };

    host.open_at_version(&payload.db, current + 1, &mut |editor| {
        editor.create_collection(
            &payload.collection,
            payload.key_path.as_ref(),
            payload.auto_increment,
        )?;
        for index in &payload.indexes {
            if let Err(e) = editor.create_index(&payload.collection, index) {
                warn!(
                    "Skipping index '{}' on '{}/{}': {}",
                    index.name, payload.db, payload.collection, e
                );
            }
        }
        Ok(())
    })
}

fn put_payload(
    db: &dyn RecordDatabase,
    payload: &StructuredRecordPayload,
) -> Result<(), RecordStoreError> {
    let collection = db.collection(&payload.collection)?;
    put_record(collection.as_ref(), payload)
}

fn put_record(
    collection: &dyn RecordCollection,
    payload: &StructuredRecordPayload,
) -> Result<(), RecordStoreError> {
    if collection.key_path().is_some() {
        collection.put(None, &payload.value)
    } else {
        collection.put(Some(&payload.key), &payload.value)
    }
}
