//! Remote command channels for batch-relay.
//!
//! - `CommandChannel`: async trait for one command/response exchange
//! - `ShellChannel`: persistent shell process (e.g. `ssh <host>`)
//! - `ScriptedChannel`: in-memory batch queue, behind the `scripted` feature

mod channel;
mod error;
#[cfg(feature = "scripted")]
mod scripted;
mod shell;

pub use channel::CommandChannel;
pub use error::ChannelError;
#[cfg(feature = "scripted")]
pub use scripted::ScriptedChannel;
pub use shell::ShellChannel;
