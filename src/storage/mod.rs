//! Injected storage ports.
//!
//! Browser storage is reached here through narrow traits rather than global
//! objects: the host injects one implementation per storage surface and every
//! call site in the core goes through the injected handle. This is what lets
//! the reload-survival guard intercept *all* access paths with a decorator
//! instead of patching shared prototypes, and what makes the whole protocol
//! testable against the in-memory implementations in [`memory`].

/// Deterministic in-memory implementations of the ports, with failure injection.
pub mod memory;

mod accessor;

pub use accessor::{capture_local_accessors, CapturedStore};

use crate::errors::StoreError;
use crate::records::RecordStoreHost;
use std::rc::Rc;

/// Port over an origin-scoped simple key-value store.
///
/// Mirrors the four accessor operations of the storage interface (read-by-key,
/// write, remove, read-key-by-index) plus `clear` and bulk key enumeration.
/// Implementations are single-threaded; handles are shared via `Rc`.
pub trait KeyValueStore {
    /// Number of entries currently stored.
    fn len(&self) -> usize;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the key at `index` in the store's iteration order, or `None`
    /// past the end.
    fn key_at(&self, index: usize) -> Result<Option<String>, StoreError>;

    /// Reads the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` under `key`, replacing any existing value.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes the entry under `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Removes every entry.
    fn clear(&self) -> Result<(), StoreError>;

    /// All keys currently stored, in iteration order.
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

/// Port over the document cookie surface.
pub trait CookieJar {
    /// The full cookie string, `;`-separated pairs as the document reports it.
    fn cookie_string(&self) -> String;

    /// Sets (or replaces) one cookie.
    fn set(&self, name: &str, value: &str) -> Result<(), StoreError>;
}

/// Host-environment collaborator hooks.
///
/// The surrounding application supplies the reload primitive, the one-shot
/// readiness signal the core waits on before first storage use, and the
/// isolated-context accessor factory used to bypass overrides other code may
/// have installed on the shared storage interface.
pub trait HostHooks {
    /// Blocks until the host application signals its extension API is ready.
    /// Called exactly once, before the core first touches storage.
    fn wait_ready(&self);

    /// Asks the host to reload the page. Control does not return to restore
    /// logic until the next load's resume phase.
    fn request_reload(&self);

    /// Produces local-store accessors from a never-before-touched isolated
    /// context, untouched by any overrides installed on the main context.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` when the isolated context cannot be
    /// created; callers degrade to the live handle.
    fn pristine_local_store(&self) -> Result<Rc<dyn KeyValueStore>, StoreError>;
}

/// The full set of injected ports for one origin.
pub struct HostEnv {
    /// The origin all four storage surfaces are scoped to.
    pub origin: String,
    /// Persistent simple key-value store. The guard swaps this handle for its
    /// decorator while a protection window is active.
    pub local: Rc<dyn KeyValueStore>,
    /// Same-session simple key-value store (also holds the reapply sentinel).
    pub session: Rc<dyn KeyValueStore>,
    /// Cookie surface.
    pub cookies: Rc<dyn CookieJar>,
    /// Structured-record store host.
    pub records: Rc<dyn RecordStoreHost>,
    /// Reload / readiness / isolated-context collaborators.
    pub hooks: Rc<dyn HostHooks>,
}
