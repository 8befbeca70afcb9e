//! Error types for the scheduler crate.

use thiserror::Error;

/// Errors that can occur during scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration rejected at construction
    #[error("Invalid scheduler configuration: {0}")]
    InvalidConfig(String),

    /// Scheduler no longer accepts work
    #[error("Scheduler is shut down")]
    ShutDown,
}
