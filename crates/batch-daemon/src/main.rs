//! batch-daemon
//!
//! Runs long computations on a remote batch queue as a chain of
//! time-limited segments.
//!
//! # Usage
//!
//! ```bash
//! batch-daemon submit --total-minutes 120 --segments 4 --host cluster -- mqrun -np 1 -maxtime 30 run.sh
//! batch-daemon session --host cluster
//! batch-daemon template /home/user/run.sh
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/batch-relay/config.toml)
//! 3. Environment variables (BATCH_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use batch_daemon::{run_session, show_template, submit_job, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            total_minutes,
            segments,
            host,
            report_secs,
            command,
        } => {
            submit_job(
                cli.config.as_deref(),
                cli.log_level.as_deref(),
                host.as_deref(),
                &total_minutes,
                &segments,
                report_secs,
                &command,
            )
            .await?;
        }
        Commands::Session { host } => {
            run_session(cli.config.as_deref(), cli.log_level.as_deref(), host.as_deref()).await?;
        }
        Commands::Template { path } => {
            show_template(&path);
        }
    }

    Ok(())
}
