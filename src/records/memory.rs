//! In-memory structured-record store.
//!
//! A deterministic, single-process implementation of the record-store ports,
//! used by the test suite and by demos. Failure injection switches cover the
//! degraded paths the enumerator and writer must survive: discovery loss,
//! engines without bulk reads, collections that fail mid-read, and index
//! creation failures during a version upgrade.

use super::{RecordCollection, RecordDatabase, RecordStoreHost, SchemaEditor};
use crate::document::{IndexDescriptor, RecordEntry};
use crate::errors::RecordStoreError;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

#[derive(Default)]
struct MemCollection {
    key_path: Option<Value>,
    auto_increment: bool,
    next_key: u64,
    indexes: Vec<IndexDescriptor>,
    entries: Vec<(Value, Value)>,
}

#[derive(Default)]
struct MemDatabase {
    version: u64,
    collections: BTreeMap<String, MemCollection>,
}

#[derive(Default)]
struct HostInner {
    databases: BTreeMap<String, MemDatabase>,
    discovery_unavailable: bool,
    refuse_bulk: HashSet<String>,
    fail_reads: HashSet<String>,
    fail_cursor_after: HashMap<String, usize>,
    fail_index_names: HashSet<String>,
    open_handles: usize,
}

/// Declarative collection schema for seeding a [`MemoryRecordHost`].
pub struct CollectionSpec {
    name: String,
    key_path: Option<Value>,
    auto_increment: bool,
    indexes: Vec<IndexDescriptor>,
}

impl CollectionSpec {
    /// Starts a spec for a collection with out-of-line keys.
    pub fn new(name: &str) -> Self {
        CollectionSpec {
            name: name.to_string(),
            key_path: None,
            auto_increment: false,
            indexes: Vec::new(),
        }
    }

    /// Sets the in-line key path.
    pub fn key_path(mut self, path: Value) -> Self {
        self.key_path = Some(path);
        self
    }

    /// Marks the collection as auto-incrementing.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Adds a secondary index.
    pub fn index(mut self, descriptor: IndexDescriptor) -> Self {
        self.indexes.push(descriptor);
        self
    }
}

/// In-memory implementation of [`RecordStoreHost`].
///
/// Cloning shares the underlying databases, so a test can keep one handle for
/// seeding and assertions while the code under test holds another.
#[derive(Clone, Default)]
pub struct MemoryRecordHost {
    inner: Rc<RefCell<HostInner>>,
}

impl MemoryRecordHost {
    /// Creates an empty host with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or re-versions) a database.
    pub fn create_database(&self, name: &str, version: u64) {
        let mut inner = self.inner.borrow_mut();
        inner.databases.entry(name.to_string()).or_default().version = version;
    }

    /// Adds a collection to a database, creating the database at version 1 if
    /// it does not exist yet.
    pub fn create_collection(&self, database: &str, spec: CollectionSpec) {
        let mut inner = self.inner.borrow_mut();
        let db = inner.databases.entry(database.to_string()).or_default();
        if db.version == 0 {
            db.version = 1;
        }
        db.collections.insert(
            spec.name,
            MemCollection {
                key_path: spec.key_path,
                auto_increment: spec.auto_increment,
                next_key: 1,
                indexes: spec.indexes,
                entries: Vec::new(),
            },
        );
    }

    /// Inserts a record directly, creating the database/collection if needed.
    pub fn insert(&self, database: &str, collection: &str, key: Value, value: Value) {
        let mut inner = self.inner.borrow_mut();
        let db = inner.databases.entry(database.to_string()).or_default();
        if db.version == 0 {
            db.version = 1;
        }
        let col = db.collections.entry(collection.to_string()).or_default();
        upsert(&mut col.entries, key, value);
    }

    /// Reads a record back, for assertions.
    pub fn get(&self, database: &str, collection: &str, key: &Value) -> Option<Value> {
        let inner = self.inner.borrow();
        inner
            .databases
            .get(database)?
            .collections
            .get(collection)?
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Returns a database's stored version, for assertions.
    pub fn database_version(&self, database: &str) -> Option<u64> {
        self.inner.borrow().databases.get(database).map(|d| d.version)
    }

    /// Returns the index descriptors of a collection, for assertions.
    pub fn collection_indexes(&self, database: &str, collection: &str) -> Vec<IndexDescriptor> {
        self.inner
            .borrow()
            .databases
            .get(database)
            .and_then(|d| d.collections.get(collection))
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    /// Makes `database_names` report discovery as unavailable.
    pub fn set_discovery_unavailable(&self, unavailable: bool) {
        self.inner.borrow_mut().discovery_unavailable = unavailable;
    }

    /// Makes the named collection refuse bulk reads, forcing the cursor walk.
    pub fn refuse_bulk_reads(&self, collection: &str) {
        self.inner.borrow_mut().refuse_bulk.insert(collection.to_string());
    }

    /// Makes every read path of the named collection fail.
    pub fn fail_collection_reads(&self, collection: &str) {
        self.inner.borrow_mut().fail_reads.insert(collection.to_string());
    }

    /// Makes cursor walks over the named collection fail after `n` entries.
    pub fn fail_cursor_after(&self, collection: &str, n: usize) {
        self.inner
            .borrow_mut()
            .fail_cursor_after
            .insert(collection.to_string(), n);
    }

    /// Makes creating the named index fail during upgrades.
    pub fn fail_index_creation(&self, index_name: &str) {
        self.inner
            .borrow_mut()
            .fail_index_names
            .insert(index_name.to_string());
    }

    /// Number of database handles currently open (opened and not yet closed).
    pub fn open_handles(&self) -> usize {
        self.inner.borrow().open_handles
    }
}

impl RecordStoreHost for MemoryRecordHost {
    fn database_names(&self) -> Result<Vec<String>, RecordStoreError> {
        let inner = self.inner.borrow();
        if inner.discovery_unavailable {
            return Err(RecordStoreError::DiscoveryUnavailable {
                message: "discovery API disabled".to_string(),
            });
        }
        Ok(inner.databases.keys().cloned().collect())
    }

    fn open(&self, name: &str) -> Result<Rc<dyn RecordDatabase>, RecordStoreError> {
        let mut inner = self.inner.borrow_mut();
        let db = inner.databases.entry(name.to_string()).or_default();
        if db.version == 0 {
            db.version = 1;
        }
        inner.open_handles += 1;
        Ok(Rc::new(MemoryDatabaseHandle {
            inner: Rc::clone(&self.inner),
            name: name.to_string(),
            closed: Cell::new(false),
        }))
    }

    fn open_at_version(
        &self,
        name: &str,
        version: u64,
        upgrade: &mut dyn FnMut(&dyn SchemaEditor) -> Result<(), RecordStoreError>,
    ) -> Result<Rc<dyn RecordDatabase>, RecordStoreError> {
        let stored = {
            let mut inner = self.inner.borrow_mut();
            let db = inner.databases.entry(name.to_string()).or_default();
            if db.version == 0 {
                db.version = 1;
            }
            db.version
        };

        if version < stored {
            return Err(RecordStoreError::OpenFailed {
                name: name.to_string(),
                message: format!(
                    "requested version {} is below stored version {}",
                    version, stored
                ),
            });
        }

        if version > stored {
            let editor = MemorySchemaEditor {
                inner: Rc::clone(&self.inner),
                database: name.to_string(),
            };
            upgrade(&editor)?;
            if let Some(db) = self.inner.borrow_mut().databases.get_mut(name) {
                db.version = version;
            }
        }

        self.open(name)
    }
}

struct MemoryDatabaseHandle {
    inner: Rc<RefCell<HostInner>>,
    name: String,
    closed: Cell<bool>,
}

impl RecordDatabase for MemoryDatabaseHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn version(&self) -> u64 {
        self.inner
            .borrow()
            .databases
            .get(&self.name)
            .map(|d| d.version)
            .unwrap_or(0)
    }

    fn collection_names(&self) -> Vec<String> {
        self.inner
            .borrow()
            .databases
            .get(&self.name)
            .map(|d| d.collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn collection(&self, name: &str) -> Result<Rc<dyn RecordCollection>, RecordStoreError> {
        let exists = self
            .inner
            .borrow()
            .databases
            .get(&self.name)
            .map(|d| d.collections.contains_key(name))
            .unwrap_or(false);
        if !exists {
            return Err(RecordStoreError::MissingCollection {
                database: self.name.clone(),
                collection: name.to_string(),
            });
        }
        Ok(Rc::new(MemoryCollectionHandle {
            inner: Rc::clone(&self.inner),
            database: self.name.clone(),
            name: name.to_string(),
        }))
    }

    fn close(&self) {
        if !self.closed.replace(true) {
            let mut inner = self.inner.borrow_mut();
            inner.open_handles = inner.open_handles.saturating_sub(1);
        }
    }
}

struct MemoryCollectionHandle {
    inner: Rc<RefCell<HostInner>>,
    database: String,
    name: String,
}

impl MemoryCollectionHandle {
    fn with_collection<T>(&self, f: impl FnOnce(&MemCollection) -> T) -> Option<T> {
        let inner = self.inner.borrow();
        inner
            .databases
            .get(&self.database)
            .and_then(|d| d.collections.get(&self.name))
            .map(f)
    }

    fn read_failure(&self) -> Option<RecordStoreError> {
        if self.inner.borrow().fail_reads.contains(&self.name) {
            Some(RecordStoreError::TransactionFailed {
                database: self.database.clone(),
                collection: self.name.clone(),
                message: "injected read failure".to_string(),
            })
        } else {
            None
        }
    }
}

impl RecordCollection for MemoryCollectionHandle {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn key_path(&self) -> Option<Value> {
        self.with_collection(|c| c.key_path.clone()).flatten()
    }

    fn auto_increment(&self) -> bool {
        self.with_collection(|c| c.auto_increment).unwrap_or(false)
    }

    fn indexes(&self) -> Vec<IndexDescriptor> {
        self.with_collection(|c| c.indexes.clone()).unwrap_or_default()
    }

    fn get_all(&self) -> Result<Vec<RecordEntry>, RecordStoreError> {
        if let Some(e) = self.read_failure() {
            return Err(e);
        }
        if self.inner.borrow().refuse_bulk.contains(&self.name) {
            return Err(RecordStoreError::BulkReadUnsupported {
                collection: self.name.clone(),
            });
        }
        Ok(self
            .with_collection(|c| {
                c.entries
                    .iter()
                    .map(|(key, value)| RecordEntry {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn cursor(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Result<RecordEntry, RecordStoreError>>>, RecordStoreError>
    {
        if let Some(e) = self.read_failure() {
            return Err(e);
        }

        let fail_after = self.inner.borrow().fail_cursor_after.get(&self.name).copied();
        let entries: Vec<(Value, Value)> =
            self.with_collection(|c| c.entries.clone()).unwrap_or_default();

        let mut steps: Vec<Result<RecordEntry, RecordStoreError>> = Vec::new();
        for (position, (key, value)) in entries.into_iter().enumerate() {
            if fail_after == Some(position) {
                steps.push(Err(RecordStoreError::TransactionFailed {
                    database: self.database.clone(),
                    collection: self.name.clone(),
                    message: format!("injected cursor failure at position {}", position),
                }));
                break;
            }
            steps.push(Ok(RecordEntry { key, value }));
        }
        Ok(Box::new(steps.into_iter()))
    }

    fn put(&self, key: Option<&Value>, value: &Value) -> Result<(), RecordStoreError> {
        let mut inner = self.inner.borrow_mut();
        let collection = inner
            .databases
            .get_mut(&self.database)
            .and_then(|d| d.collections.get_mut(&self.name))
            .ok_or_else(|| RecordStoreError::MissingCollection {
                database: self.database.clone(),
                collection: self.name.clone(),
            })?;

        let effective_key = match (key, collection.key_path.clone()) {
            (_, Some(path)) => extract_key(value, &path).ok_or_else(|| {
                RecordStoreError::TransactionFailed {
                    database: self.database.clone(),
                    collection: self.name.clone(),
                    message: format!("value carries no key at keyPath {}", path),
                }
            })?,
            (Some(key), None) => key.clone(),
            (None, None) if collection.auto_increment => {
                let generated = Value::from(collection.next_key);
                collection.next_key += 1;
                generated
            }
            (None, None) => {
                return Err(RecordStoreError::TransactionFailed {
                    database: self.database.clone(),
                    collection: self.name.clone(),
                    message: "out-of-line key required".to_string(),
                })
            }
        };

        upsert(&mut collection.entries, effective_key, value.clone());
        Ok(())
    }
}

struct MemorySchemaEditor {
    inner: Rc<RefCell<HostInner>>,
    database: String,
}

impl SchemaEditor for MemorySchemaEditor {
    fn create_collection(
        &self,
        name: &str,
        key_path: Option<&Value>,
        auto_increment: bool,
    ) -> Result<(), RecordStoreError> {
        let mut inner = self.inner.borrow_mut();
        let db = inner
            .databases
            .get_mut(&self.database)
            .ok_or_else(|| RecordStoreError::OpenFailed {
                name: self.database.clone(),
                message: "database vanished during upgrade".to_string(),
            })?;
        db.collections.insert(
            name.to_string(),
            MemCollection {
                key_path: key_path.cloned(),
                auto_increment,
                next_key: 1,
                indexes: Vec::new(),
                entries: Vec::new(),
            },
        );
        Ok(())
    }

    fn create_index(
        &self,
        collection: &str,
        index: &IndexDescriptor,
    ) -> Result<(), RecordStoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_index_names.contains(&index.name) {
            return Err(RecordStoreError::SchemaCreation {
                database: self.database.clone(),
                collection: collection.to_string(),
                message: format!("injected failure creating index '{}'", index.name),
            });
        }
        let target = inner
            .databases
            .get_mut(&self.database)
            .and_then(|d| d.collections.get_mut(collection))
            .ok_or_else(|| RecordStoreError::MissingCollection {
                database: self.database.clone(),
                collection: collection.to_string(),
            })?;
        target.indexes.push(index.clone());
        Ok(())
    }
}

fn upsert(entries: &mut Vec<(Value, Value)>, key: Value, value: Value) {
    if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
        slot.1 = value;
    } else {
        entries.push((key, value));
    }
}

/// Extracts a record key from a value by key path. Dotted paths descend into
/// nested objects; array key paths are not supported by this engine.
fn extract_key(value: &Value, path: &Value) -> Option<Value> {
    let path = path.as_str()?;
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_with_inline_key_path() {
        let host = MemoryRecordHost::new();
        host.create_collection("db", CollectionSpec::new("col").key_path(json!("id")));

        let db = host.open("db").unwrap();
        let col = db.collection("col").unwrap();
        col.put(None, &json!({"id": 7, "name": "x"})).unwrap();
        db.close();

        assert_eq!(host.get("db", "col", &json!(7)), Some(json!({"id": 7, "name": "x"})));
    }

    #[test]
    fn test_put_with_dotted_key_path() {
        let host = MemoryRecordHost::new();
        host.create_collection("db", CollectionSpec::new("col").key_path(json!("meta.id")));

        let db = host.open("db").unwrap();
        let col = db.collection("col").unwrap();
        col.put(None, &json!({"meta": {"id": "k"}, "v": 1})).unwrap();
        db.close();

        assert_eq!(
            host.get("db", "col", &json!("k")),
            Some(json!({"meta": {"id": "k"}, "v": 1}))
        );
    }

    #[test]
    fn test_put_auto_increment_generates_keys() {
        let host = MemoryRecordHost::new();
        host.create_collection("db", CollectionSpec::new("col").auto_increment());

        let db = host.open("db").unwrap();
        let col = db.collection("col").unwrap();
        col.put(None, &json!("first")).unwrap();
        col.put(None, &json!("second")).unwrap();
        db.close();

        assert_eq!(host.get("db", "col", &json!(1)), Some(json!("first")));
        assert_eq!(host.get("db", "col", &json!(2)), Some(json!("second")));
    }

    #[test]
    fn test_put_out_of_line_key_required() {
        let host = MemoryRecordHost::new();
        host.create_collection("db", CollectionSpec::new("col"));

        let db = host.open("db").unwrap();
        let col = db.collection("col").unwrap();
        assert!(col.put(None, &json!("v")).is_err());
        assert!(col.put(Some(&json!("k")), &json!("v")).is_ok());
        db.close();
    }

    #[test]
    fn test_open_at_lower_version_rejected() {
        let host = MemoryRecordHost::new();
        host.create_database("db", 5);
        let result = host.open_at_version("db", 3, &mut |_| Ok(()));
        assert!(matches!(result, Err(RecordStoreError::OpenFailed { .. })));
    }

    #[test]
    fn test_upgrade_runs_editor_and_bumps_version() {
        let host = MemoryRecordHost::new();
        host.create_database("db", 1);

        let db = host
            .open_at_version("db", 2, &mut |editor| {
                editor.create_collection("fresh", None, false)
            })
            .unwrap();
        db.close();

        assert_eq!(host.database_version("db"), Some(2));
        let reopened = host.open("db").unwrap();
        assert!(reopened.collection_names().contains(&"fresh".to_string()));
        reopened.close();
    }
}
