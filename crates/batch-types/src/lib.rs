//! # batch-types
//!
//! Shared types for batch-relay:
//! - Settings: layered configuration for the shell session, scheduler
//!   and orchestrator
//! - BatchError: configuration errors

pub mod config;
pub mod error;

pub use config::{OrchestratorSettings, SchedulerSettings, Settings, ShellSettings};
pub use error::BatchError;
