//! Configuration management for the stashguard application.
//!
//! This module handles loading and validating configuration settings from
//! environment variables, with sensible defaults. It covers the guard's
//! protection window and failure-report bounds; the reconciliation cadence is
//! a fixed table in [`crate::constants`] and deliberately not configurable at
//! runtime.
//!
//! # Environment Variables
//!
//! - `STASHGUARD_PROTECT_WINDOW_SECS`: Protection window length in seconds
//!   (defaults to 120)
//! - `STASHGUARD_FAILURE_REPORT_CAP`: How many item failures a report lists
//!   verbatim before summarizing the remainder (defaults to 5)

use crate::constants::{
    DEFAULT_FAILURE_REPORT_CAP, DEFAULT_PROTECT_WINDOW_SECS, ENV_VAR_FAILURE_CAP,
    ENV_VAR_PROTECT_WINDOW,
};
use crate::errors::{AppError, AppResult};
use std::env;
use std::time::Duration;

/// Configuration for the stashguard application.
///
/// This struct holds the tunables of the restore-durability protocol: how
/// long restored local-store keys stay under write protection after a reload,
/// and how many item failures are reported verbatim.
///
/// # Examples
///
/// Creating a configuration manually:
/// ```
/// use stashguard::Config;
/// use std::time::Duration;
///
/// let config = Config {
///     protect_window: Duration::from_secs(30),
///     failure_report_cap: 3,
/// };
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// How long restored local-store keys are defended against concurrent
    /// writers after the post-reload reapply.
    pub protect_window: Duration,

    /// How many item failures `ApplyReport` lists verbatim; the rest are
    /// summarized as an overflow count.
    pub failure_report_cap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            protect_window: Duration::from_secs(DEFAULT_PROTECT_WINDOW_SECS),
            failure_report_cap: DEFAULT_FAILURE_REPORT_CAP,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if:
    /// - `STASHGUARD_PROTECT_WINDOW_SECS` is set but not a positive integer
    /// - `STASHGUARD_FAILURE_REPORT_CAP` is set but not a positive integer
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use stashguard::Config;
    ///
    /// match Config::load() {
    ///     Ok(config) => println!("Protection window: {:?}", config.protect_window),
    ///     Err(err) => eprintln!("Failed to load config: {}", err),
    /// }
    /// ```
    pub fn load() -> AppResult<Self> {
        let protect_secs = match env::var(ENV_VAR_PROTECT_WINDOW) {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_VAR_PROTECT_WINDOW, raw
                ))
            })?,
            Err(_) => DEFAULT_PROTECT_WINDOW_SECS,
        };

        let failure_cap = match env::var(ENV_VAR_FAILURE_CAP) {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                AppError::Config(format!(
                    "{} must be a whole number, got '{}'",
                    ENV_VAR_FAILURE_CAP, raw
                ))
            })?,
            Err(_) => DEFAULT_FAILURE_REPORT_CAP,
        };

        let config = Config {
            protect_window: Duration::from_secs(protect_secs),
            failure_report_cap: failure_cap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the protection window is zero or the
    /// failure report cap is zero. A zero window would make every guarded
    /// operation a pass-through from the moment of install, which is never
    /// what a caller enabling the guard wants.
    pub fn validate(&self) -> AppResult<()> {
        if self.protect_window.is_zero() {
            return Err(AppError::Config(
                "Protection window must be non-zero".to_string(),
            ));
        }
        if self.failure_report_cap == 0 {
            return Err(AppError::Config(
                "Failure report cap must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
