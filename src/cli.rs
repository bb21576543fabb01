//! CLI definitions for the triggerstore binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// TriggerStore CLI.
#[derive(Parser)]
#[command(name = "triggerstore")]
#[command(about = "Distributed job store over a shared key-value store")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path (default: <config dir>/triggerstore/config.toml)
    #[arg(short, long, global = true, env = "TRIGGERSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write daily-rolling log files into this directory
    #[arg(long, global = true, env = "TRIGGERSTORE_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Print the effective configuration as TOML
    Config,

    /// Run several scheduler instances against one in-memory store
    Simulate {
        /// Number of scheduler instances
        #[arg(long, default_value_t = 3)]
        instances: usize,

        /// Number of jobs to schedule
        #[arg(long, default_value_t = 6)]
        jobs: usize,

        /// How long to run, in seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,

        /// Poll interval of each instance, in milliseconds
        #[arg(long, default_value_t = 200)]
        poll_ms: u64,

        /// Stop the first instance without cleanup after this many seconds
        #[arg(long)]
        crash_after: Option<u64>,
    },
}
