use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "hashdir")]
#[command(about = "Index file content hashes and report duplicates", long_about = None)]
pub struct Cli {
    /// Database file (overrides `db_path` from configuration)
    #[arg(long, global = true)]
    pub db: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash every file under a directory and update the index
    Scan {
        /// Directory to scan
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Hashing threads (default: one per core)
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Remove records for files that no longer exist
    Prune,
    /// Summarize the index: totals, largest files, duplicate groups
    Report {
        /// Number of largest files to show
        #[arg(long)]
        top: Option<usize>,
        /// Maximum duplicate groups to show
        #[arg(long)]
        groups: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every file with the given content hash
    Lookup { hash: String },
    /// Show recent scan sessions
    Sessions {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Print configuration values
    PrintConfig,
}
