//! Host-facing operations.
//!
//! The three entry points a presentation layer calls, one per file:
//!
//! - `snapshot`: capture all four storage surfaces into one backup document
//! - `plan`: parse an uploaded document into a selectable restore plan
//! - `apply`: write a selected item list back into live storage
//!
//! The presentation layer owns all UI concerns and is a pure caller of these.

/// Applying a selected item list back into storage.
pub mod apply;
/// Parsing a backup document into restorable items.
pub mod plan;
/// Capturing a backup document from live storage.
pub mod snapshot;

pub use apply::{apply_selection, ApplyCounts, ApplyReport};
pub use plan::{plan_restore, RestorePlan};
pub use snapshot::{backup_filename, produce_snapshot, write_snapshot};
