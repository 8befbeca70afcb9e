//! The command channel abstraction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::ChannelError;

/// A remote shell that executes text commands and returns their output.
///
/// Implementations wrap one logical session. A call to `send` is one
/// command/response exchange; callers sharing a channel must not interleave
/// exchanges.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    /// Send `command` and return the captured output text.
    async fn send(&self, command: &str) -> Result<String, ChannelError>;

    /// Whether the underlying session is open.
    fn is_connected(&self) -> bool;
}

#[async_trait]
impl<T: CommandChannel + ?Sized> CommandChannel for Arc<T> {
    async fn send(&self, command: &str) -> Result<String, ChannelError> {
        (**self).send(command).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
