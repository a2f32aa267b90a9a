//! Time-boxed write protection for restored local-store keys.
//!
//! After a post-reload reapply, other startup code may race to reinitialize
//! its own state and stomp the just-restored values. The protection service
//! owns the set of defended keys, each key's desired value, the expiry of the
//! protection window, and the fixed reconciliation schedule. It is plain
//! state with a clock passed in; the interception itself lives in the
//! [`super::GuardedStore`] decorator, and the reconciliation passes are driven
//! by the host calling `tick`.

use crate::constants::RECONCILE_DELAYS_MS;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Protection state for a fixed key set, valid for one protection window.
///
/// Rebuilt on every load that finds a reapply stash; never persisted.
#[derive(Default)]
pub struct ProtectionService {
    desired: HashMap<String, String>,
    protect_until: Option<Instant>,
    pass_deadlines: Vec<Instant>,
    next_pass: usize,
}

impl ProtectionService {
    /// Creates an inactive service protecting nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a protection window over `desired` lasting `window` from `now`,
    /// and schedules the fixed reconciliation cadence.
    pub fn install(&mut self, desired: HashMap<String, String>, window: Duration, now: Instant) {
        debug!(
            "Protecting {} key(s) for {:?}",
            desired.len(),
            window
        );
        self.desired = desired;
        self.protect_until = Some(now + window);
        self.pass_deadlines = RECONCILE_DELAYS_MS
            .iter()
            .map(|ms| now + Duration::from_millis(*ms))
            .collect();
        self.next_pass = 0;
    }

    /// Whether the protection window is active at `now`.
    pub fn active(&self, now: Instant) -> bool {
        match self.protect_until {
            Some(deadline) => now < deadline,
            None => false,
        }
    }

    /// Whether a window was ever installed, active or not.
    pub fn installed(&self) -> bool {
        self.protect_until.is_some()
    }

    /// Whether `key` is under unexpired protection at `now`.
    pub fn is_protected(&self, key: &str, now: Instant) -> bool {
        self.active(now) && self.desired.contains_key(key)
    }

    /// The defended value for `key`, if it is under unexpired protection.
    pub fn desired_value(&self, key: &str, now: Instant) -> Option<&str> {
        if self.active(now) {
            self.desired.get(key).map(String::as_str)
        } else {
            None
        }
    }

    /// The full desired map, regardless of expiry. Reconciliation passes use
    /// this directly: the pass schedule, not the window, bounds their life.
    pub fn desired_map(&self) -> &HashMap<String, String> {
        &self.desired
    }

    /// Consumes and returns the number of reconciliation passes whose
    /// deadline has arrived by `now`.
    pub fn due_passes(&mut self, now: Instant) -> usize {
        let mut due = 0;
        while self.next_pass < self.pass_deadlines.len() && self.pass_deadlines[self.next_pass] <= now
        {
            self.next_pass += 1;
            due += 1;
        }
        due
    }

    /// How many reconciliation passes remain scheduled.
    pub fn remaining_passes(&self) -> usize {
        self.pass_deadlines.len() - self.next_pass
    }
}
