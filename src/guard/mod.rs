//! Reload-survival guard.
//!
//! A restore usually needs a page reload before the host application picks up
//! the restored configuration, but the reload's startup window is exactly when
//! other code races to reinitialize its own state and may stomp the restored
//! values. The guard converts a best-effort restore into a durable one:
//!
//! 1. **Stash**: right before the reload, the selected item list and current
//!    origin are serialized into a fixed same-session sentinel slot.
//! 2. **Reapply**: on the next load the sentinel is read and deleted
//!    (at-most-once, unconditionally), then the items are re-applied before
//!    anything else observable.
//! 3. **Protect**: the restored local-store keys go under a time-boxed
//!    decorator that overrides racing writes, reads, and removals, while a
//!    fixed schedule of reconciliation passes repairs damage done by writers
//!    holding pre-interception storage handles.
//!
//! State machine: `Idle → Stashed → Reapplied → Protecting → Expired`, where
//! expiry is implicit: the decorator stays installed but degrades to a
//! pass-through once the window closes.

mod protection;
mod store;

pub use protection::ProtectionService;
pub use store::{Clock, GuardedStore};

use crate::config::Config;
use crate::constants::{PREFIX_LOCAL, REAPPLY_SENTINEL_KEY};
use crate::document::{split_compound_key, value_to_plain_string};
use crate::errors::AppResult;
use crate::ops::{apply_selection, ApplyReport};
use crate::storage::{HostEnv, KeyValueStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where the guard's protocol currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// No restore in flight.
    Idle,
    /// A selection is stashed and a reload has been requested.
    Stashed,
    /// The stashed selection was re-applied after the reload.
    Reapplied,
    /// Restored keys are under an active protection window.
    Protecting,
    /// The protection window has passed; overrides are pass-throughs.
    Expired,
}

/// The pending selection persisted across exactly one reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReapplyStash {
    /// Origin the selection was made on; a mismatch on resume aborts.
    pub origin: String,
    /// The selected `(compound key, value)` pairs.
    pub items: Vec<(String, Value)>,
}

/// Coordinator for the stash/reapply/protect protocol.
pub struct ReloadGuard {
    protection: Rc<RefCell<ProtectionService>>,
    clock: Clock,
    state: GuardState,
}

impl ReloadGuard {
    /// Creates an idle guard reading time from `clock`.
    pub fn new(clock: Clock) -> Self {
        ReloadGuard {
            protection: Rc::new(RefCell::new(ProtectionService::new())),
            clock,
            state: GuardState::Idle,
        }
    }

    /// The protocol state at `now`. `Protecting` reports as `Expired` once
    /// the window has passed; nothing is explicitly reset.
    pub fn state(&self, now: Instant) -> GuardState {
        if self.state == GuardState::Protecting && !self.protection.borrow().active(now) {
            GuardState::Expired
        } else {
            self.state
        }
    }

    /// Persists the selection into the session-store sentinel slot, to be
    /// consumed by [`ReloadGuard::resume`] on the next load. The caller
    /// requests the reload afterwards.
    pub fn stash_selection(
        &mut self,
        session: &dyn KeyValueStore,
        origin: &str,
        items: &[(String, Value)],
    ) -> AppResult<()> {
        let stash = ReapplyStash {
            origin: origin.to_string(),
            items: items.to_vec(),
        };
        let raw = serde_json::to_string(&stash)?;
        session.set(REAPPLY_SENTINEL_KEY, &raw)?;
        self.state = GuardState::Stashed;
        info!(
            "Stashed {} item(s) for reapplication after reload",
            stash.items.len()
        );
        Ok(())
    }

    /// Runs the post-reload phase: consume the stash, re-apply it, and open
    /// the protection window over the restored local-store keys.
    ///
    /// Returns `None` when there was no stash or it was discarded (corrupt,
    /// wrong origin, or empty). Call [`ReloadGuard::guarded_local`] afterwards
    /// to obtain the decorator for the environment's local handle.
    pub fn resume(
        &mut self,
        env: &HostEnv,
        config: &Config,
        now: Instant,
    ) -> AppResult<Option<ApplyReport>> {
        let stash = match take_stash(env.session.as_ref())? {
            Some(stash) => stash,
            None => return Ok(None),
        };

        if stash.origin != env.origin {
            warn!(
                "Discarding reapply stash: stashed origin {:?} does not match {:?}",
                stash.origin, env.origin
            );
            return Ok(None);
        }
        if stash.items.is_empty() {
            warn!("Discarding empty reapply stash");
            return Ok(None);
        }

        info!("Reapplying {} stashed item(s)", stash.items.len());
        let report = apply_selection(
            env,
            Some(&stash.origin),
            &stash.items,
            config.failure_report_cap,
        );
        self.state = GuardState::Reapplied;

        let desired = desired_local_keys(&stash.items);
        self.protection
            .borrow_mut()
            .install(desired, config.protect_window, now);
        self.state = GuardState::Protecting;

        Ok(Some(report))
    }

    /// Wraps `underlying` in the protection decorator. The caller installs
    /// the result as the environment's local handle, so every access path
    /// through the injected port is intercepted.
    pub fn guarded_local(&self, underlying: Rc<dyn KeyValueStore>) -> GuardedStore {
        GuardedStore::new(
            underlying,
            Rc::clone(&self.protection),
            Rc::clone(&self.clock),
        )
    }

    /// Runs any reconciliation passes that have come due by `now`.
    ///
    /// Each pass reads every protected key through `native` (accessors that
    /// bypass the decorator) and re-applies divergent values through the
    /// apply engine. This is the backstop for writers holding a storage
    /// reference captured before interception was installed.
    ///
    /// Returns the number of keys repaired.
    pub fn reconcile(
        &mut self,
        env: &HostEnv,
        native: &dyn KeyValueStore,
        failure_cap: usize,
        now: Instant,
    ) -> AppResult<usize> {
        let due = self.protection.borrow_mut().due_passes(now);
        if due == 0 {
            return Ok(0);
        }
        debug!("Running {} reconciliation pass(es)", due);

        let desired: Vec<(String, String)> = self
            .protection
            .borrow()
            .desired_map()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut repaired = 0;
        for (key, desired_value) in desired {
            let current = native.get(&key)?;
            if current.as_deref() != Some(desired_value.as_str()) {
                warn!(
                    "Protected key '{}' diverged ({:?}), re-applying",
                    key, current
                );
                let item = (
                    format!("{}:{}", PREFIX_LOCAL, key),
                    Value::String(desired_value),
                );
                apply_selection(env, None, &[item], failure_cap);
                repaired += 1;
            }
        }
        Ok(repaired)
    }
}

/// Reads and unconditionally deletes the sentinel entry.
///
/// Deletion happens before parsing, so a corrupt stash is consumed exactly
/// like a valid one and can never be retried.
fn take_stash(session: &dyn KeyValueStore) -> AppResult<Option<ReapplyStash>> {
    let raw = match session.get(REAPPLY_SENTINEL_KEY)? {
        Some(raw) => raw,
        None => return Ok(None),
    };
    session.remove(REAPPLY_SENTINEL_KEY)?;

    match serde_json::from_str::<ReapplyStash>(&raw) {
        Ok(stash) => Ok(Some(stash)),
        Err(e) => {
            warn!("Discarding corrupt reapply stash: {}", e);
            Ok(None)
        }
    }
}

/// Extracts the local-store keys among the stashed items, mapped to their
/// desired values. Mirrors the apply engine's dispatch: an item without a
/// recognizable prefix lands in the local store under its full key.
fn desired_local_keys(items: &[(String, Value)]) -> HashMap<String, String> {
    let mut desired = HashMap::new();
    for (compound_key, value) in items {
        match split_compound_key(compound_key) {
            (Some(PREFIX_LOCAL), key) => {
                desired.insert(key.to_string(), value_to_plain_string(value));
            }
            (Some(_), _) => {}
            (None, key) => {
                desired.insert(key.to_string(), value_to_plain_string(value));
            }
        }
    }
    desired
}
