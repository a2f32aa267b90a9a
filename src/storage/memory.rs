//! In-memory implementations of the storage ports.
//!
//! Deterministic, single-process stand-ins for the browser surfaces, used by
//! the test suite and by demos. Failure injection covers the degraded paths
//! the capture and apply code must survive: indexed reads that throw, writes
//! that hit quota, and hosts that cannot produce an isolated accessor context.

use super::{CookieJar, HostEnv, HostHooks, KeyValueStore};
use crate::errors::StoreError;
use crate::records::memory::MemoryRecordHost;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};
use std::rc::Rc;

#[derive(Default)]
struct StoreInner {
    entries: BTreeMap<String, String>,
    fail_indexed_reads: bool,
    write_error_keys: HashSet<String>,
    quota_bytes: Option<usize>,
}

impl StoreInner {
    fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// In-memory simple key-value store.
///
/// Cloning shares the underlying map, so a test can hold one handle for
/// seeding and assertions while the code under test holds another. That
/// shared-inner behavior also models a writer that captured a storage
/// reference before the guard's decorator was installed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `key_at` fail, forcing callers onto the enumeration fallback.
    pub fn fail_indexed_reads(&self, fail: bool) {
        self.inner.borrow_mut().fail_indexed_reads = fail;
    }

    /// Makes writes to `key` fail with a backend error.
    pub fn fail_writes_for(&self, key: &str) {
        self.inner.borrow_mut().write_error_keys.insert(key.to_string());
    }

    /// Caps the total stored bytes; writes past the cap fail with quota errors.
    pub fn set_quota_bytes(&self, quota: usize) {
        self.inner.borrow_mut().quota_bytes = Some(quota);
    }

    /// A copy of the current contents, for assertions.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.borrow().entries.clone()
    }
}

impl KeyValueStore for MemoryStore {
    fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    fn key_at(&self, index: usize) -> Result<Option<String>, StoreError> {
        let inner = self.inner.borrow();
        if inner.fail_indexed_reads {
            return Err(StoreError::Backend {
                key: format!("#{}", index),
                message: "injected indexed-read failure".to_string(),
            });
        }
        Ok(inner.entries.keys().nth(index).cloned())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.inner.borrow().entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.write_error_keys.contains(key) {
            return Err(StoreError::Backend {
                key: key.to_string(),
                message: "injected write failure".to_string(),
            });
        }
        if let Some(quota) = inner.quota_bytes {
            let replaced = inner.entries.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            if inner.used_bytes() - replaced + key.len() + value.len() > quota {
                return Err(StoreError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.inner.borrow_mut().entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.inner.borrow_mut().entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.borrow().entries.keys().cloned().collect())
    }
}

#[derive(Default)]
struct JarInner {
    cookies: Vec<(String, String)>,
    raw_override: Option<String>,
}

/// In-memory cookie surface.
#[derive(Clone, Default)]
pub struct MemoryCookieJar {
    inner: Rc<RefCell<JarInner>>,
}

impl MemoryCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the reported cookie string verbatim, for parser edge cases
    /// (empty names, stray separators) that `set` would never produce.
    pub fn set_raw_string(&self, raw: &str) {
        self.inner.borrow_mut().raw_override = Some(raw.to_string());
    }

    /// A copy of the current cookies, for assertions.
    pub fn cookies(&self) -> Vec<(String, String)> {
        self.inner.borrow().cookies.clone()
    }
}

impl CookieJar for MemoryCookieJar {
    fn cookie_string(&self) -> String {
        let inner = self.inner.borrow();
        if let Some(raw) = &inner.raw_override {
            return raw.clone();
        }
        inner
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn set(&self, name: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(slot) = inner.cookies.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value.to_string();
        } else {
            inner.cookies.push((name.to_string(), value.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct HooksInner {
    ready_waits: usize,
    reload_requests: usize,
    pristine: Option<MemoryStore>,
}

/// In-memory host collaborator: counts readiness waits and reload requests,
/// and optionally produces an isolated-context accessor.
#[derive(Clone, Default)]
pub struct MemoryHostHooks {
    inner: Rc<RefCell<HooksInner>>,
}

impl MemoryHostHooks {
    /// Creates hooks with no isolated-context accessor (capture degrades).
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the store that `pristine_local_store` hands out.
    pub fn with_pristine(self, store: MemoryStore) -> Self {
        self.inner.borrow_mut().pristine = Some(store);
        self
    }

    /// How many times the core waited on the readiness signal.
    pub fn ready_waits(&self) -> usize {
        self.inner.borrow().ready_waits
    }

    /// How many reloads the core requested.
    pub fn reload_requests(&self) -> usize {
        self.inner.borrow().reload_requests
    }
}

impl HostHooks for MemoryHostHooks {
    fn wait_ready(&self) {
        self.inner.borrow_mut().ready_waits += 1;
    }

    fn request_reload(&self) {
        self.inner.borrow_mut().reload_requests += 1;
    }

    fn pristine_local_store(&self) -> Result<Rc<dyn KeyValueStore>, StoreError> {
        match &self.inner.borrow().pristine {
            Some(store) => Ok(Rc::new(store.clone())),
            None => Err(StoreError::Unavailable {
                message: "isolated context creation blocked".to_string(),
            }),
        }
    }
}

/// A fully in-memory [`HostEnv`] plus raw handles to every backing surface.
///
/// The raw handles bypass whatever the env's injected handles have been
/// swapped to, which is exactly how tests model startup code racing the
/// guard through a pre-interception storage reference.
pub struct MemoryEnv {
    /// The injected environment handed to the code under test.
    pub env: HostEnv,
    /// Raw handle to the local store's backing map.
    pub local: MemoryStore,
    /// Raw handle to the session store's backing map.
    pub session: MemoryStore,
    /// Raw handle to the cookie jar.
    pub cookies: MemoryCookieJar,
    /// Raw handle to the record-store host.
    pub records: MemoryRecordHost,
    /// Raw handle to the host hooks.
    pub hooks: MemoryHostHooks,
}

/// Builds a complete in-memory environment for `origin`.
///
/// The local store doubles as its own pristine accessor, mirroring the happy
/// path where the isolated context reaches the same backing storage.
pub fn memory_env(origin: &str) -> MemoryEnv {
    let local = MemoryStore::new();
    let session = MemoryStore::new();
    let cookies = MemoryCookieJar::new();
    let records = MemoryRecordHost::new();
    let hooks = MemoryHostHooks::new().with_pristine(local.clone());

    let env = HostEnv {
        origin: origin.to_string(),
        local: Rc::new(local.clone()),
        session: Rc::new(session.clone()),
        cookies: Rc::new(cookies.clone()),
        records: Rc::new(records.clone()),
        hooks: Rc::new(hooks.clone()),
    };

    MemoryEnv {
        env,
        local,
        session,
        cookies,
        records,
        hooks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_basics() {
        let store = MemoryStore::new();
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").unwrap(), Some("1".to_string()));
        assert_eq!(store.key_at(0).unwrap(), Some("a".to_string()));
        assert_eq!(store.key_at(5).unwrap(), None);

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clone_shares_backing_map() {
        let store = MemoryStore::new();
        let alias = store.clone();
        store.set("k", "v").unwrap();
        assert_eq!(alias.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_quota_enforced() {
        let store = MemoryStore::new();
        store.set_quota_bytes(6);
        store.set("abc", "def").unwrap();
        let result = store.set("x", "y");
        assert!(matches!(result, Err(StoreError::QuotaExceeded { .. })));
        // Replacing an existing value within quota still works.
        store.set("abc", "xyz").unwrap();
    }

    #[test]
    fn test_injected_indexed_read_failure() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        store.fail_indexed_reads(true);
        assert!(store.key_at(0).is_err());
        // Enumeration and keyed reads still work.
        assert_eq!(store.keys().unwrap(), vec!["k".to_string()]);
        assert_eq!(store.get("k").unwrap(), Some("v".to_string()));
    }

    #[test]
    fn test_cookie_jar_round_trip() {
        let jar = MemoryCookieJar::new();
        jar.set("sid", "abc").unwrap();
        jar.set("theme", "dark").unwrap();
        jar.set("sid", "def").unwrap();

        assert_eq!(jar.cookie_string(), "sid=def; theme=dark");
    }

    #[test]
    fn test_hooks_degrade_without_pristine_store() {
        let hooks = MemoryHostHooks::new();
        assert!(hooks.pristine_local_store().is_err());

        let hooks = MemoryHostHooks::new().with_pristine(MemoryStore::new());
        assert!(hooks.pristine_local_store().is_ok());
    }
}
