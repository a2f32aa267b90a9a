/*!
# Stashguard - Origin Storage Backup Tooling

Command-line front end for working with origin-storage backup documents
offline: summarize what a backup contains, preview which items a restore
would offer on a given origin, and upgrade legacy flat-map documents to the
current typed format.

## Usage

```
stashguard <COMMAND>

Commands:
  inspect  Summarize a backup document: metadata and per-surface entry counts
  plan     List the restorable items a document would offer on a given origin
  convert  Rewrite a document in the current typed format
```

Logging verbosity follows `RUST_LOG` when set, or `--verbose` otherwise.
*/

use std::fs;
use std::path::Path;

use stashguard::cli::{CliArgs, Command};
use stashguard::document::parse_backup;
use stashguard::errors::AppResult;
use stashguard::ops::plan_restore;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> AppResult<()> {
    let args = CliArgs::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!("CLI arguments: {:?}", args);

    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Plan { file, origin } => plan(&file, &origin),
        Command::Convert { file, output } => convert(&file, &output),
    }
}

/// Prints a document's metadata and per-surface entry counts.
fn inspect(file: &Path) -> AppResult<()> {
    let raw = fs::read_to_string(file)?;
    let document = parse_backup(&raw)?;

    match &document.meta {
        Some(meta) => {
            println!("origin:         {}", meta.origin);
            println!("exported at:    {}", meta.exported_at);
            println!("script version: {}", meta.script_version);
        }
        None => println!("legacy document (no metadata)"),
    }

    let records: usize = document
        .structured
        .iter()
        .flat_map(|db| &db.collections)
        .map(|col| col.entries.len())
        .sum();

    println!("local entries:   {}", document.local.len());
    println!("session entries: {}", document.session.len());
    println!("cookies:         {}", document.cookies.len());
    println!(
        "databases:       {} ({} record(s))",
        document.structured.len(),
        records
    );
    Ok(())
}

/// Prints the items a restore on `origin` would offer, one per line.
fn plan(file: &Path, origin: &str) -> AppResult<()> {
    let raw = fs::read_to_string(file)?;
    let plan = plan_restore(&raw, origin)?;

    if plan.origin_mismatch {
        println!(
            "note: backup origin {} differs from {}; session and cookie items omitted",
            plan.document_origin.as_deref().unwrap_or("<unknown>"),
            origin
        );
    }
    for item in &plan.items {
        println!("{}", item.compound_key);
    }
    info!("Planned {} item(s)", plan.items.len());
    Ok(())
}

/// Rewrites `file` in the current typed format at `output`.
fn convert(file: &Path, output: &Path) -> AppResult<()> {
    let raw = fs::read_to_string(file)?;
    let document = parse_backup(&raw)?;
    let pretty = serde_json::to_string_pretty(&document)?;
    fs::write(output, pretty)?;
    info!("Converted {:?} -> {:?}", file, output);
    println!("wrote {}", output.display());
    Ok(())
}
