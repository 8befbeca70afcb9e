//! CLI argument parsing for batch-daemon.
//!
//! CLI flags override all other config sources.

use clap::{Parser, Subcommand};

/// Segmented batch job runner
///
/// Submits long computations to a remote batch queue as a chain of
/// time-limited segments and resubmits each one when it ends.
#[derive(Parser, Debug)]
#[command(name = "batch-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/batch-relay/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit one segmented job and follow it until it completes
    Submit {
        /// Total run time in minutes, split evenly across segments
        #[arg(long)]
        total_minutes: String,

        /// Number of segments to run
        #[arg(long)]
        segments: String,

        /// Remote host, appended to the shell arguments
        #[arg(long)]
        host: Option<String>,

        /// Seconds between status reports
        #[arg(long, default_value = "60")]
        report_secs: u64,

        /// Command template; its first `-maxtime N` is set to the segment length
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Interactive session: submit and list jobs from stdin
    Session {
        /// Remote host, appended to the shell arguments
        #[arg(long)]
        host: Option<String>,
    },

    /// Print the default command template for a program path
    Template {
        /// Path of the program on the remote host
        path: String,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
