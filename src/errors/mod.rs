//! Error handling utilities for the stashguard application.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, as well as the
//! convenience type alias `AppResult` for functions that can return these errors.

use std::io;
use thiserror::Error;

/// Represents specific error cases that can occur against a simple key-value store.
///
/// These errors surface from whatever concrete [`crate::storage::KeyValueStore`]
/// implementation the host injected. Each variant captures the key involved so
/// batch reports can name the offending item.
///
/// # Examples
///
/// ```
/// use stashguard::errors::StoreError;
///
/// let error = StoreError::QuotaExceeded { key: "theme".to_string() };
/// assert!(format!("{}", error).contains("quota"));
/// assert!(format!("{}", error).contains("theme"));
/// ```
#[derive(Debug, Error)]
pub enum StoreError {
    /// Error when a write would exceed the store's per-origin quota.
    #[error("Storage quota exceeded while writing key '{key}'")]
    QuotaExceeded {
        /// The key whose write was rejected
        key: String,
    },

    /// Error when the backing store rejected an operation for another reason.
    #[error("Storage backend failed on key '{key}': {message}")]
    Backend {
        /// The key involved in the failed operation
        key: String,
        /// A description of the failure from the backing store
        message: String,
    },

    /// Error when the store (or an isolated accessor context) cannot be reached at all.
    #[error("Storage interface unavailable: {message}")]
    Unavailable {
        /// A description of why the interface could not be obtained
        message: String,
    },
}

/// Represents specific error cases that can occur against structured record stores.
///
/// The structured-store ports are versioned multi-collection databases; this
/// enum distinguishes the failure modes the enumerator and writer care about,
/// in particular [`RecordStoreError::BulkReadUnsupported`] which triggers the
/// cursor-walk fallback rather than failing the read.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// Error when the database discovery API is not available in this environment.
    #[error("Structured-store discovery is unavailable: {message}")]
    DiscoveryUnavailable {
        /// A description of why discovery is unavailable
        message: String,
    },

    /// Error when a database cannot be opened.
    #[error("Failed to open database '{name}': {message}")]
    OpenFailed {
        /// The database name
        name: String,
        /// A description of the failure
        message: String,
    },

    /// Error when a named collection does not exist in the opened database.
    #[error("Collection '{collection}' not found in database '{database}'")]
    MissingCollection {
        /// The database name
        database: String,
        /// The missing collection name
        collection: String,
    },

    /// Error when a collection's engine exposes no bulk all-keys/all-values read.
    ///
    /// This is an expected condition, not a failure: callers fall back to a
    /// forward cursor walk.
    #[error("Bulk read unsupported for collection '{collection}'")]
    BulkReadUnsupported {
        /// The collection name
        collection: String,
    },

    /// Error when a read or write transaction fails partway through.
    #[error("Transaction failed on '{database}/{collection}': {message}")]
    TransactionFailed {
        /// The database name
        database: String,
        /// The collection name
        collection: String,
        /// The underlying engine error
        message: String,
    },

    /// Error when creating a collection during a version upgrade fails.
    #[error("Failed to create collection '{collection}' in database '{database}': {message}")]
    SchemaCreation {
        /// The database name
        database: String,
        /// The collection that could not be created
        collection: String,
        /// The underlying engine error
        message: String,
    },
}

/// Represents all possible errors that can occur in the stashguard application.
///
/// This enum is the central error type used across the application, with variants
/// for different error categories. It uses `thiserror` for deriving the `Error`
/// trait implementation and formatted error messages.
///
/// Note that per-item restore failures are deliberately *not* represented here:
/// the apply engine records them as strings in its report and keeps going, so a
/// single bad item never aborts a batch.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use stashguard::errors::AppError;
///
/// let error = AppError::Config("Protection window must be non-zero".to_string());
/// assert_eq!(
///     format!("{}", error),
///     "Configuration error: Protection window must be non-zero"
/// );
/// ```
///
/// Converting from an IO error:
/// ```
/// use stashguard::errors::AppError;
/// use std::io::{self, ErrorKind};
///
/// let io_error = io::Error::new(ErrorKind::NotFound, "file not found");
/// let app_error: AppError = io_error.into();
///
/// match app_error {
///     AppError::Io(inner) => assert_eq!(inner.kind(), ErrorKind::NotFound),
///     _ => panic!("Expected Io variant"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration-related errors (invalid env var values, bad tunables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error when a backup document cannot be parsed at all.
    ///
    /// Parsing aborts the import with no partial state changes.
    #[error("Backup document could not be parsed: {0}")]
    Parse(String),

    /// I/O errors when reading or writing backup files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization errors for documents we produce ourselves.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Simple key-value store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Structured record store errors.
    #[error("Record store error: {0}")]
    Records(#[from] RecordStoreError),
}

/// A convenient type alias for Results with AppError as the error type.
///
/// # Examples
///
/// ```
/// use stashguard::errors::{AppError, AppResult};
///
/// fn might_fail(succeed: bool) -> AppResult<String> {
///     if succeed {
///         Ok("success".to_string())
///     } else {
///         Err(AppError::Config("failed".to_string()))
///     }
/// }
///
/// assert!(might_fail(true).is_ok());
/// assert!(might_fail(false).is_err());
/// ```
pub type AppResult<T> = Result<T, AppError>;
