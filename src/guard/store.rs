//! Guarded key-value store decorator.
//!
//! Wraps any [`KeyValueStore`] and consults the protection service before
//! delegating, preserving the "intercept all access paths" guarantee by
//! sitting in front of the injected handle rather than patching anything
//! global. Once the protection window expires every operation degrades to a
//! pass-through; the decorator is never uninstalled.

use super::protection::ProtectionService;
use crate::errors::StoreError;
use crate::storage::KeyValueStore;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;
use tracing::debug;

/// Clock used by the decorator; injectable so tests control expiry.
pub type Clock = Rc<dyn Fn() -> Instant>;

/// A [`KeyValueStore`] that defends protected keys while the window is open.
pub struct GuardedStore {
    underlying: Rc<dyn KeyValueStore>,
    protection: Rc<RefCell<ProtectionService>>,
    clock: Clock,
}

impl GuardedStore {
    /// Wraps `underlying`, consulting `protection` on every operation.
    pub fn new(
        underlying: Rc<dyn KeyValueStore>,
        protection: Rc<RefCell<ProtectionService>>,
        clock: Clock,
    ) -> Self {
        GuardedStore {
            underlying,
            protection,
            clock,
        }
    }

    /// The wrapped handle, for callers that must bypass interception (the
    /// reconciliation passes read through this).
    pub fn underlying(&self) -> Rc<dyn KeyValueStore> {
        Rc::clone(&self.underlying)
    }
}

impl KeyValueStore for GuardedStore {
    fn len(&self) -> usize {
        self.underlying.len()
    }

    fn key_at(&self, index: usize) -> Result<Option<String>, StoreError> {
        self.underlying.key_at(index)
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = (self.clock)();
        if let Some(desired) = self.protection.borrow().desired_value(key, now) {
            // Serve from memory: storage may hold a transitional value.
            return Ok(Some(desired.to_string()));
        }
        self.underlying.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let now = (self.clock)();
        if let Some(desired) = self.protection.borrow().desired_value(key, now) {
            if desired != value {
                debug!("Overriding write to protected key '{}'", key);
            }
            return self.underlying.set(key, desired);
        }
        self.underlying.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let now = (self.clock)();
        if let Some(desired) = self.protection.borrow().desired_value(key, now) {
            debug!("Blocking removal of protected key '{}'", key);
            return self.underlying.set(key, desired);
        }
        self.underlying.remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let now = (self.clock)();
        let protection = self.protection.borrow();
        if protection.active(now) && !protection.desired_map().is_empty() {
            debug!("Clearing store while sparing protected keys");
            for key in self.underlying.keys()? {
                if !protection.is_protected(&key, now) {
                    self.underlying.remove(&key)?;
                }
            }
            return Ok(());
        }
        drop(protection);
        self.underlying.clear()
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.underlying.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::time::Duration;

    struct Fixture {
        raw: MemoryStore,
        guarded: GuardedStore,
        offset: Rc<Cell<Duration>>,
    }

    fn fixture(desired: &[(&str, &str)], window: Duration) -> Fixture {
        let raw = MemoryStore::new();
        let base = Instant::now();
        let offset = Rc::new(Cell::new(Duration::ZERO));
        let clock_offset = Rc::clone(&offset);
        let clock: Clock = Rc::new(move || base + clock_offset.get());

        let mut protection = ProtectionService::new();
        let map: HashMap<String, String> = desired
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        protection.install(map, window, base);
        for (k, v) in desired {
            raw.set(k, v).unwrap();
        }

        let guarded = GuardedStore::new(
            Rc::new(raw.clone()),
            Rc::new(RefCell::new(protection)),
            clock,
        );
        Fixture {
            raw,
            guarded,
            offset,
        }
    }

    #[test]
    fn test_write_to_protected_key_is_overridden() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));

        f.guarded.set("k", "v2").unwrap();

        assert_eq!(f.guarded.get("k").unwrap(), Some("v1".to_string()));
        assert_eq!(f.raw.get("k").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn test_read_of_protected_key_served_from_memory() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));

        // A writer with a pre-interception handle stomps the stored value.
        f.raw.set("k", "stomped").unwrap();

        assert_eq!(f.guarded.get("k").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn test_removal_of_protected_key_rewrites_desired() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));

        f.guarded.remove("k").unwrap();

        assert_eq!(f.raw.get("k").unwrap(), Some("v1".to_string()));
    }

    #[test]
    fn test_clear_spares_protected_keys() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));
        f.raw.set("other", "x").unwrap();

        f.guarded.clear().unwrap();

        assert_eq!(f.raw.get("k").unwrap(), Some("v1".to_string()));
        assert_eq!(f.raw.get("other").unwrap(), None);
    }

    #[test]
    fn test_unprotected_keys_pass_through() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));

        f.guarded.set("free", "w").unwrap();
        assert_eq!(f.guarded.get("free").unwrap(), Some("w".to_string()));
        f.guarded.remove("free").unwrap();
        assert_eq!(f.guarded.get("free").unwrap(), None);
    }

    #[test]
    fn test_everything_passes_through_after_expiry() {
        let f = fixture(&[("k", "v1")], Duration::from_secs(120));
        f.offset.set(Duration::from_secs(120));

        f.guarded.set("k", "v2").unwrap();
        assert_eq!(f.guarded.get("k").unwrap(), Some("v2".to_string()));

        f.guarded.remove("k").unwrap();
        assert_eq!(f.guarded.get("k").unwrap(), None);

        f.raw.set("k", "v3").unwrap();
        f.raw.set("other", "x").unwrap();
        f.guarded.clear().unwrap();
        assert_eq!(f.raw.len(), 0);
    }
}
