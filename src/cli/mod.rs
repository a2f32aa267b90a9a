use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Offline tooling for origin-storage backup documents
#[derive(Parser, Debug)]
#[clap(name = "stashguard", about = "Inspect, plan, and convert origin-storage backup documents")]
#[clap(author, version, long_about = None)]
pub struct CliArgs {
    /// Print verbose output
    #[clap(short = 'v', long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// The offline operations available on a backup file.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Summarize a backup document: metadata and per-surface entry counts
    Inspect {
        /// Path to the backup JSON file
        file: PathBuf,
    },
    /// List the restorable items a document would offer on a given origin
    Plan {
        /// Path to the backup JSON file
        file: PathBuf,

        /// Origin to plan the restore against
        #[clap(short = 'o', long)]
        origin: String,
    },
    /// Rewrite a document (including the legacy flat-map shape) in the
    /// current typed format
    Convert {
        /// Path to the backup JSON file
        file: PathBuf,

        /// Where to write the converted document
        #[clap(short = 'o', long)]
        output: PathBuf,
    },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse() -> Self {
        CliArgs::parse_from(std::env::args())
    }
}
