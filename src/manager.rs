//! Top-level session orchestrator.
//!
//! Owns the injected environment, configuration, and reload guard, and walks
//! one page load through the full lifecycle: wait for host readiness, resume
//! any pending restore (installing interception), serve snapshot and restore
//! requests, and drive reconciliation ticks. One manager per load; nothing
//! here is persisted except the guard's session-store sentinel.

use crate::config::Config;
use crate::document::BackupDocument;
use crate::errors::AppResult;
use crate::guard::{Clock, GuardState, ReloadGuard};
use crate::ops::{
    apply_selection, plan_restore, produce_snapshot, ApplyReport, RestorePlan,
};
use crate::storage::{HostEnv, KeyValueStore};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};

/// One page load's backup/restore session.
pub struct SettingsManager {
    env: HostEnv,
    config: Config,
    guard: ReloadGuard,
    /// The local handle as injected, before any decorator swap. Reconciliation
    /// reads through this so it sees what storage actually holds.
    native_local: Rc<dyn KeyValueStore>,
    /// Origin recorded in the most recently imported document, if any.
    imported_origin: Option<String>,
}

impl SettingsManager {
    /// Builds a manager over `env` and blocks on the host readiness signal.
    ///
    /// Call [`SettingsManager::resume`] immediately afterwards, before any
    /// other startup code runs, so a pending restore wins the race.
    pub fn new(env: HostEnv, config: Config, clock: Clock) -> Self {
        env.hooks.wait_ready();
        debug!("Host environment ready for origin {}", env.origin);
        let native_local = Rc::clone(&env.local);
        SettingsManager {
            env,
            config,
            guard: ReloadGuard::new(clock),
            native_local,
            imported_origin: None,
        }
    }

    /// The injected environment, with the guard's decorator in place once a
    /// resume has installed protection.
    pub fn env(&self) -> &HostEnv {
        &self.env
    }

    /// Captures a backup document covering all four storage surfaces.
    pub fn snapshot(&self, now: DateTime<Local>) -> AppResult<BackupDocument> {
        produce_snapshot(&self.env, now)
    }

    /// Parses an uploaded document into its restorable items, remembering the
    /// document's recorded origin for the later apply phase.
    pub fn plan(&mut self, raw: &str) -> AppResult<RestorePlan> {
        let plan = plan_restore(raw, &self.env.origin)?;
        self.imported_origin = plan.document_origin.clone();
        Ok(plan)
    }

    /// Applies the user's selection, then optionally stashes it and requests
    /// the reload that lets it survive racing startup code.
    ///
    /// With `reload` set, control effectively ends here for this load; the
    /// next load's [`SettingsManager::resume`] re-applies the stash and opens
    /// the protection window.
    pub fn apply(&mut self, items: &[(String, Value)], reload: bool) -> AppResult<ApplyReport> {
        let report = apply_selection(
            &self.env,
            self.imported_origin.as_deref(),
            items,
            self.config.failure_report_cap,
        );

        if reload {
            self.guard
                .stash_selection(self.env.session.as_ref(), &self.env.origin, items)?;
            info!("Requesting reload to finalize restore");
            self.env.hooks.request_reload();
        }
        Ok(report)
    }

    /// Runs the post-reload resume phase.
    ///
    /// When a stash is found and accepted, the selection is re-applied, the
    /// protection window opens, and the environment's local handle is swapped
    /// for the guard's decorator so every subsequent access path through this
    /// manager is intercepted. A no-op when no stash is pending.
    pub fn resume(&mut self, now: Instant) -> AppResult<Option<ApplyReport>> {
        let report = self.guard.resume(&self.env, &self.config, now)?;
        if report.is_some() {
            let guarded = self.guard.guarded_local(Rc::clone(&self.native_local));
            self.env.local = Rc::new(guarded);
        }
        Ok(report)
    }

    /// Runs any reconciliation passes due by `now`, repairing protected keys
    /// stomped through handles that bypass the decorator. The host calls this
    /// periodically during the protection window.
    ///
    /// Returns the number of keys repaired.
    pub fn tick(&mut self, now: Instant) -> AppResult<usize> {
        self.guard.reconcile(
            &self.env,
            self.native_local.as_ref(),
            self.config.failure_report_cap,
            now,
        )
    }

    /// Where the reload-survival protocol currently stands.
    pub fn state(&self, now: Instant) -> GuardState {
        self.guard.state(now)
    }
}
