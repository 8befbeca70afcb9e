//! Error types for job orchestration.

use thiserror::Error;

use batch_channel::ChannelError;
use batch_scheduler::SchedulerError;

/// Errors returned by the orchestrator and its monitor steps.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Request rejected before any job was created
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Orchestrator settings failed validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sending a command to the remote shell failed
    #[error("Communication failure: {0}")]
    Channel(#[from] ChannelError),

    /// The scheduler refused new work
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// `shutdown()` has been called
    #[error("Orchestrator is shut down")]
    ShutDown,
}
