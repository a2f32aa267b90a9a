//! Integration tests for the reload-survival guard.
//!
//! These tests walk the full protocol across two simulated page loads: the
//! first load applies a restore and stashes it, the second load resumes the
//! stash, and the restored keys then survive racing writes through both
//! intercepted and pre-interception storage handles until the protection
//! window closes.

use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};
use stashguard::config::Config;
use stashguard::constants::REAPPLY_SENTINEL_KEY;
use stashguard::guard::Clock;
use stashguard::storage::memory::{memory_env, MemoryEnv};
use stashguard::storage::{HostEnv, KeyValueStore};
use stashguard::{GuardState, SettingsManager};

/// A clock the test can advance by setting an offset.
fn test_clock() -> (Clock, Rc<Cell<Duration>>) {
    let base = Instant::now();
    let offset = Rc::new(Cell::new(Duration::ZERO));
    let handle = Rc::clone(&offset);
    let clock: Clock = Rc::new(move || base + handle.get());
    (clock, offset)
}

/// Builds a manager over the same backing stores, as a fresh page load would.
fn load(mem: &MemoryEnv, clock: Clock) -> SettingsManager {
    let env = HostEnv {
        origin: mem.env.origin.clone(),
        local: Rc::new(mem.local.clone()),
        session: Rc::new(mem.session.clone()),
        cookies: Rc::new(mem.cookies.clone()),
        records: Rc::new(mem.records.clone()),
        hooks: Rc::new(mem.hooks.clone()),
    };
    SettingsManager::new(env, Config::default(), clock)
}

fn selection() -> Vec<(String, Value)> {
    vec![
        ("localStorage:theme".to_string(), json!("dark")),
        ("localStorage:unit_system".to_string(), json!("metric")),
        ("sessionStorage:draft".to_string(), json!("wip")),
    ]
}

#[test]
fn test_restore_survives_reload_and_racing_writes() {
    let mem = memory_env("https://example.com");
    let (clock, offset) = test_clock();
    let now = || (clock)();

    // Load 1: apply with reload. The stash lands in session storage and the
    // reload is requested.
    let mut first = load(&mem, Rc::clone(&clock));
    first.apply(&selection(), true).unwrap();
    assert_eq!(mem.hooks.reload_requests(), 1);
    assert_eq!(first.state(now()), GuardState::Stashed);

    // Load 2: resume consumes the stash and re-applies it.
    let mut second = load(&mem, Rc::clone(&clock));
    let report = second.resume(now()).unwrap().unwrap();
    assert_eq!(report.counts.local, 2);
    assert_eq!(report.counts.session, 1);
    assert_eq!(second.state(now()), GuardState::Protecting);
    assert_eq!(mem.session.get(REAPPLY_SENTINEL_KEY).unwrap(), None);

    // Startup code writing through the manager's injected handle is overridden.
    second.env().local.set("theme", "light").unwrap();
    assert_eq!(mem.local.get("theme").unwrap(), Some("dark".to_string()));

    // Removal is blocked the same way.
    second.env().local.remove("unit_system").unwrap();
    assert_eq!(
        mem.local.get("unit_system").unwrap(),
        Some("metric".to_string())
    );

    // A writer with a pre-interception handle stomps storage directly; the
    // next reconciliation pass repairs it.
    mem.local.set("theme", "stomped").unwrap();
    offset.set(Duration::from_millis(500));
    let repaired = second.tick(now()).unwrap();
    assert_eq!(repaired, 1);
    assert_eq!(mem.local.get("theme").unwrap(), Some("dark".to_string()));

    // Session keys were never protected.
    mem.session.set("draft", "overwritten").unwrap();
    offset.set(Duration::from_secs(2));
    second.tick(now()).unwrap();
    assert_eq!(
        mem.session.get("draft").unwrap(),
        Some("overwritten".to_string())
    );

    // After the window closes, writes pass through again.
    offset.set(Duration::from_secs(120));
    assert_eq!(second.state(now()), GuardState::Expired);
    second.env().local.set("theme", "light").unwrap();
    assert_eq!(mem.local.get("theme").unwrap(), Some("light".to_string()));
}

#[test]
fn test_second_resume_finds_nothing() {
    let mem = memory_env("https://example.com");
    let (clock, _) = test_clock();

    let mut first = load(&mem, Rc::clone(&clock));
    first.apply(&selection(), true).unwrap();

    let mut second = load(&mem, Rc::clone(&clock));
    assert!(second.resume((clock)()).unwrap().is_some());

    // A third load (or a second resume call) sees no stash and installs
    // nothing.
    let mut third = load(&mem, Rc::clone(&clock));
    assert!(third.resume((clock)()).unwrap().is_none());
    assert_eq!(third.state((clock)()), GuardState::Idle);
}

#[test]
fn test_stash_from_other_origin_is_discarded() {
    let mem = memory_env("https://b.example");
    let (clock, _) = test_clock();

    mem.session
        .set(
            REAPPLY_SENTINEL_KEY,
            r#"{"origin":"https://a.example","items":[["localStorage:k","v"]]}"#,
        )
        .unwrap();

    let mut mgr = load(&mem, Rc::clone(&clock));
    assert!(mgr.resume((clock)()).unwrap().is_none());
    assert_eq!(mem.local.get("k").unwrap(), None);
    // The foreign stash was still consumed.
    assert_eq!(mem.session.get(REAPPLY_SENTINEL_KEY).unwrap(), None);
}

#[test]
fn test_corrupt_stash_never_wedges_startup() {
    let mem = memory_env("https://example.com");
    let (clock, _) = test_clock();
    mem.session.set(REAPPLY_SENTINEL_KEY, "not json at all").unwrap();

    let mut mgr = load(&mem, Rc::clone(&clock));
    assert!(mgr.resume((clock)()).unwrap().is_none());
    assert_eq!(mgr.state((clock)()), GuardState::Idle);
    assert_eq!(mem.session.get(REAPPLY_SENTINEL_KEY).unwrap(), None);
}

#[test]
fn test_reads_serve_desired_value_during_window() {
    let mem = memory_env("https://example.com");
    let (clock, _) = test_clock();

    let mut first = load(&mem, Rc::clone(&clock));
    first.apply(&selection(), true).unwrap();

    let mut second = load(&mem, Rc::clone(&clock));
    second.resume((clock)()).unwrap();

    // Even with storage stomped out-of-band, reads through the guarded
    // handle report the restored value.
    mem.local.set("theme", "stomped").unwrap();
    assert_eq!(
        second.env().local.get("theme").unwrap(),
        Some("dark".to_string())
    );
}

#[test]
fn test_reconciliation_passes_follow_cadence_until_exhausted() {
    let mem = memory_env("https://example.com");
    let (clock, offset) = test_clock();

    let mut first = load(&mem, Rc::clone(&clock));
    first
        .apply(&[("localStorage:k".to_string(), json!("v"))], true)
        .unwrap();

    let mut second = load(&mem, Rc::clone(&clock));
    second.resume((clock)()).unwrap();

    // Stomp before every deadline; a tick with passes due repairs the key,
    // a tick between deadlines does nothing.
    for (millis, expected) in [(500u64, 1usize), (600, 0), (2_000, 1), (120_000, 1)] {
        mem.local.set("k", "stomped").unwrap();
        offset.set(Duration::from_millis(millis));
        let repaired = second.tick((clock)()).unwrap();
        assert_eq!(repaired, expected, "at {}ms", millis);
    }

    // Schedule exhausted: later stomps stay.
    mem.local.set("k", "stomped").unwrap();
    offset.set(Duration::from_secs(500));
    assert_eq!(second.tick((clock)()).unwrap(), 0);
    assert_eq!(mem.local.get("k").unwrap(), Some("stomped".to_string()));
}
