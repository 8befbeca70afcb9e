//! batch-daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (submit, session, template)
//! - `session`: Line commands for the interactive session

pub mod cli;
pub mod commands;
pub mod session;

pub use cli::{Cli, Commands};
pub use commands::{run_session, show_template, submit_job};
pub use session::{execute, format_jobs, Reply, SessionCommand};
