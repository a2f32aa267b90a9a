//! Structured-record store ports and the backup enumerator.
//!
//! A structured-record store is a versioned, per-origin database holding
//! multiple named collections of key-addressed records with optional secondary
//! indexes. As with the simple stores, the engine is reached through injected
//! ports so the core never touches a concrete browser API directly.
//!
//! The enumerator in this module produces the `structuredStores` section of a
//! backup document: it discovers every database, opens each read-only, and
//! captures full schema plus entries per collection, preferring a bulk read
//! and falling back to a forward cursor walk for engines that do not expose
//! one. Individual collection failures degrade to empty or partial captures;
//! they never fail the enclosing database.

mod writer;

/// In-memory versioned record store for tests and demos.
pub mod memory;

pub use writer::{ensure_schema, write_record};

use crate::document::{CollectionBackup, DatabaseBackup, IndexDescriptor, RecordEntry};
use crate::errors::RecordStoreError;
use serde_json::Value;
use std::rc::Rc;
use tracing::{debug, warn};

/// Schema mutation surface available only inside a version-upgrade step.
pub trait SchemaEditor {
    /// Creates a collection with the given key path and auto-increment flag.
    fn create_collection(
        &self,
        name: &str,
        key_path: Option<&Value>,
        auto_increment: bool,
    ) -> Result<(), RecordStoreError>;

    /// Creates one secondary index on an existing collection.
    fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor,
    ) -> Result<(), RecordStoreError>;
}

/// An open handle to one structured-record database.
pub trait RecordDatabase {
    /// The database name.
    fn name(&self) -> String;

    /// The schema version the handle was opened at.
    fn version(&self) -> u64;

    /// Names of every collection in the database.
    fn collection_names(&self) -> Vec<String>;

    /// Opens a handle to the named collection.
    ///
    /// # Errors
    ///
    /// Returns `RecordStoreError::MissingCollection` if no such collection
    /// exists at the handle's version.
    fn collection(&self, name: &str) -> Result<Rc<dyn RecordCollection>, RecordStoreError>;

    /// Releases the handle. Further use of collections obtained from it is a
    /// logic error in the caller.
    fn close(&self);
}

/// A handle to one named record collection.
pub trait RecordCollection {
    /// The collection name.
    fn name(&self) -> String;

    /// The collection's in-line key path, if it has one.
    fn key_path(&self) -> Option<Value>;

    /// Whether the engine generates keys for this collection.
    fn auto_increment(&self) -> bool;

    /// Descriptors for every secondary index.
    fn indexes(&self) -> Vec<IndexDescriptor>;

    /// Bulk all-keys/all-values read.
    ///
    /// # Errors
    ///
    /// Returns `RecordStoreError::BulkReadUnsupported` when the engine has no
    /// bulk path for this collection; callers fall back to [`Self::cursor`].
    fn get_all(&self) -> Result<Vec<RecordEntry>, RecordStoreError>;

    /// Forward cursor over the collection's entries.
    ///
    /// The walk may fail partway; each step yields a `Result` so callers can
    /// keep what accumulated before the failure.
    fn cursor(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<RecordEntry, RecordStoreError>>>, RecordStoreError>;

    /// Writes one record. `key` must be `None` for collections with an
    /// in-line key path (the key lives inside the value) and `Some` otherwise,
    /// unless the collection auto-increments.
    fn put(&self, key: Option<&Value>, value: &Value) -> Result<(), RecordStoreError>;
}

/// Host of all structured-record databases for the origin.
pub trait RecordStoreHost {
    /// Discovers every database name.
    ///
    /// # Errors
    ///
    /// Returns `RecordStoreError::DiscoveryUnavailable` when the environment
    /// exposes no discovery API; the enumerator degrades to an empty capture.
    fn database_names(&self) -> Result<Vec<String>, RecordStoreError>;

    /// Opens the named database at its current version, creating it at
    /// version 1 with no collections if it does not exist.
    fn open(&self, name: &str) -> Result<Rc<dyn RecordDatabase>, RecordStoreError>;

    /// Opens the named database at `version`, running `upgrade` inside the
    /// version-upgrade step when the stored version is lower.
    fn open_at_version(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut dyn FnMut(&dyn SchemaEditor) -> Result<(), RecordStoreError>,
    ) -> Result<Rc<dyn RecordDatabase>, RecordStoreError>;
}

/// Captures every structured-record database for the origin.
///
/// Discovery failures yield an empty list; a database that cannot be opened is
/// skipped with a warning. Within a database every collection is read before
/// the database's capture is produced, and the handle is released afterwards.
pub fn enumerate_databases(host: &dyn RecordStoreHost) -> Vec<DatabaseBackup> {
    let names = match host.database_names() {
        Ok(names) => names,
        Err(e) => {
            warn!("Structured-store discovery unavailable, capturing none: {}", e);
            return Vec::new();
        }
    };

    let mut captures = Vec::with_capacity(names.len());
    for name in names {
        match host.open(&name) {
            Ok(db) => {
                let capture = snapshot_database(db.as_ref());
                db.close();
                captures.push(capture);
            }
            Err(e) => {
                warn!("Skipping database '{}': {}", name, e);
            }
        }
    }
    captures
}

/// Captures one open database: schema and entries for every collection.
///
/// A collection whose handle or read fails contributes an empty (or partial)
/// capture rather than failing the database.
pub fn snapshot_database(db: &dyn RecordDatabase) -> DatabaseBackup {
    let mut collections = Vec::new();
    for collection_name in db.collection_names() {
        match db.collection(&collection_name) {
            Ok(collection) => collections.push(snapshot_collection(collection.as_ref())),
            Err(e) => {
                warn!(
                    "Collection '{}/{}' unreadable, capturing empty: {}",
                    db.name(),
                    collection_name,
                    e
                );
                collections.push(CollectionBackup {
                    name: collection_name,
                    key_path: None,
                    auto_increment: false,
                    indexes: Vec::new(),
                    entries: Vec::new(),
                });
            }
        }
    }

    DatabaseBackup {
        name: db.name(),
        version: db.version(),
        collections,
    }
}

fn snapshot_collection(collection: &dyn RecordCollection) -> CollectionBackup {
    CollectionBackup {
        name: collection.name(),
        key_path: collection.key_path(),
        auto_increment: collection.auto_increment(),
        indexes: collection.indexes(),
        entries: read_collection_entries(collection),
    }
}

/// Reads every entry of a collection: bulk path first, cursor walk when the
/// engine has no bulk read, empty capture on any other failure.
pub fn read_collection_entries(collection: &dyn RecordCollection) -> Vec<RecordEntry> {
    match collection.get_all() {
        Ok(entries) => entries,
        Err(RecordStoreError::BulkReadUnsupported { .. }) => {
            debug!(
                "Bulk read unsupported for '{}', walking cursor",
                collection.name()
            );
            cursor_walk(collection)
        }
        Err(e) => {
            warn!(
                "Bulk read failed for '{}', capturing empty: {}",
                collection.name(),
                e
            );
            Vec::new()
        }
    }
}

fn cursor_walk(collection: &dyn RecordCollection) -> Vec<RecordEntry> {
    let cursor = match collection.cursor() {
        Ok(cursor) => cursor,
        Err(e) => {
            warn!(
                "Cursor open failed for '{}', capturing empty: {}",
                collection.name(),
                e
            );
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for step in cursor {
        match step {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                // Keep what accumulated; a broken walk is a partial capture.
                warn!(
                    "Cursor walk over '{}' stopped after {} entries: {}",
                    collection.name(),
                    entries.len(),
                    e
                );
                break;
            }
        }
    }
    entries
}
