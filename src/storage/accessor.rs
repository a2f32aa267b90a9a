//! Native-accessor capture for the simple key-value stores.
//!
//! Other code sharing the page may have overridden the storage interface's
//! accessors; reads through those overrides can be filtered or stale. Capture
//! asks the host for accessors taken from a disposable, never-before-touched
//! isolated context, and degrades to the live (possibly overridden) handle
//! when the host cannot produce one. The fallback order is a fixed, visible
//! contract: pristine first, live second, never an error.

use super::{HostHooks, KeyValueStore};
use std::rc::Rc;
use tracing::{debug, warn};

/// The accessor handle capture settled on.
pub struct CapturedStore {
    /// The store to read through.
    pub store: Rc<dyn KeyValueStore>,
    /// Whether the handle came from an isolated context (`true`) or is the
    /// live, possibly overridden handle (`false`).
    pub pristine: bool,
}

/// Captures local-store accessors, preferring an isolated context.
///
/// Never fails: when the host cannot create the isolated context the live
/// handle is returned with a warning.
pub fn capture_local_accessors(
    hooks: &dyn HostHooks,
    live: Rc<dyn KeyValueStore>,
) -> CapturedStore {
    match hooks.pristine_local_store() {
        Ok(store) => {
            debug!("Captured pristine local-store accessors");
            CapturedStore {
                store,
                pristine: true,
            }
        }
        Err(e) => {
            warn!(
                "Isolated accessor context unavailable, using live accessors: {}",
                e
            );
            CapturedStore {
                store: live,
                pristine: false,
            }
        }
    }
}
