//! Error types for remote command channels.

use thiserror::Error;

/// Errors from sending a command through a channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The session is closed or was never opened
    #[error("Shell channel is not connected")]
    NotConnected,

    /// The session process could not be started
    #[error("Failed to spawn shell session '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Transport error while writing a command
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}
