/*!
# Stashguard

Stashguard backs up and restores the per-origin browser storage a userscript's
settings live in: the two simple key-value stores, cookies, and structured
record databases. A snapshot gathers all four surfaces into one portable JSON
document; a restore lets the user pick a subset of that document and writes it
back, then survives the page reload that follows by re-applying the selection
and defending the restored keys against racing startup code.

## Core Features

- Snapshot all four storage surfaces into one timestamped JSON document
- Parse typed and legacy flat-map documents into a selectable restore plan
- Apply a selected subset, gating cross-origin session and cookie items
- Reload-survival guard: stash, post-reload reapply, time-boxed key
  protection, and scheduled reconciliation passes
- Offline CLI for inspecting, planning, and converting backup files

## Architecture

Browser surfaces are reached through injected ports (`storage`, `records`),
so the core is host-agnostic and fully testable in memory:

- `cli`: Command-line interface handling using clap
- `config`: Configuration loading and validation
- `errors`: Error handling infrastructure
- `document`: The backup document model and compound-key scheme
- `storage` / `records`: Injected ports over the storage surfaces
- `ops`: The snapshot, plan, and apply operations
- `guard`: The reload-survival protocol
- `manager`: Per-load orchestration of all of the above

## Usage Example

```rust
use stashguard::storage::memory::memory_env;
use stashguard::storage::KeyValueStore;
use stashguard::ops::produce_snapshot;

fn main() -> stashguard::AppResult<()> {
    let mem = memory_env("https://example.com");
    mem.local.set("theme", "dark")?;

    let document = produce_snapshot(&mem.env, chrono::Local::now())?;
    assert_eq!(document.local["theme"], "dark");
    Ok(())
}
```
*/

/// Command-line interface for parsing and handling user arguments
pub mod cli;
/// Configuration loading and management
pub mod config;
/// Application-wide constants
pub mod constants;
/// The backup document model, parsing, and compound keys
pub mod document;
/// Error types and utilities for error handling
pub mod errors;
/// The reload-survival guard protocol
pub mod guard;
/// Per-load session orchestration
pub mod manager;
/// The snapshot, plan, and apply operations
pub mod ops;
/// Injected ports over structured record databases
pub mod records;
/// Injected ports over the simple stores, cookies, and host hooks
pub mod storage;

// Re-export important types for convenience
pub use cli::CliArgs;
pub use config::Config;
pub use document::BackupDocument;
pub use errors::{AppError, AppResult};
pub use guard::GuardState;
pub use manager::SettingsManager;
