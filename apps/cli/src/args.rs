use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "honey")]
#[command(about = "Rotation sensor ledger sync", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Override the configured data directory for this run only
    #[arg(long, global = true)]
    pub data_path: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Publish closed ledger files and refresh aggregates
    Sync {
        /// Run a single tick and print its report as JSON
        #[arg(long, default_value_t = false)]
        once: bool,
    },
    /// Save one collector tick with the given pulse count
    Record {
        #[arg(long)]
        count: u64,
    },
    /// Show the cursor marker and which ledger files are eligible
    Marker,
}
