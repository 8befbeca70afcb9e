//! Error types shared across batch-relay crates.

use thiserror::Error;

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
