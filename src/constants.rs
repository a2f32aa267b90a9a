//! Constants used throughout the application.
//!
//! This module contains all constants used in stashguard, organized into
//! logical groups. Having constants centralized makes them easier to find,
//! modify, and reference consistently.

// Configuration Keys & Environment Variables
/// Environment variable overriding the protection window, in whole seconds.
pub const ENV_VAR_PROTECT_WINDOW: &str = "STASHGUARD_PROTECT_WINDOW_SECS";
/// Environment variable overriding how many item failures a report lists.
pub const ENV_VAR_FAILURE_CAP: &str = "STASHGUARD_FAILURE_REPORT_CAP";

// Backup File Parameters
/// Prefix for downloadable backup filenames.
pub const BACKUP_FILENAME_PREFIX: &str = "wme_settings_backup_";
/// File extension for backup documents.
pub const BACKUP_FILE_EXTENSION: &str = ".json";

// Compound-Key Type Prefixes
/// Compound-key prefix for local-store items.
pub const PREFIX_LOCAL: &str = "localStorage";
/// Compound-key prefix for session-store items.
pub const PREFIX_SESSION: &str = "sessionStorage";
/// Compound-key prefix for cookie items.
pub const PREFIX_COOKIE: &str = "cookie";
/// Compound-key prefix for structured-record items.
pub const PREFIX_STRUCTURED: &str = "indexedDB";

// Reload-Survival Guard
/// Session-store slot holding the pending restore selection across a reload.
pub const REAPPLY_SENTINEL_KEY: &str = "stashguard.pending_restore";
/// Default protection window after a reapply, in seconds.
pub const DEFAULT_PROTECT_WINDOW_SECS: u64 = 120;
/// Fixed reconciliation cadence after a reapply, in milliseconds from install.
pub const RECONCILE_DELAYS_MS: &[u64] = &[
    500, 2_000, 5_000, 10_000, 20_000, 30_000, 45_000, 60_000, 90_000, 120_000,
];

// Reporting
/// Default number of item failures listed verbatim before summarizing the rest.
pub const DEFAULT_FAILURE_REPORT_CAP: usize = 5;
