//! Delayed task scheduler for batch-relay.
//!
//! This crate runs one-shot callbacks after a delay on a bounded pool of
//! tokio tasks, with an explicit create -> use -> shutdown lifecycle.
//!
//! # Features
//!
//! - One-shot delayed execution with `tokio::time`
//! - Bounded concurrency via a semaphore of worker slots
//! - Graceful shutdown via CancellationToken with a forced-abort deadline
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use batch_scheduler::{DelayScheduler, SchedulerConfig};
//!
//! let scheduler = Arc::new(DelayScheduler::new(SchedulerConfig::default())?);
//!
//! scheduler.schedule("status-check", Duration::from_secs(10), |_token| async {
//!     poll_queue().await;
//! })?;
//!
//! scheduler.shutdown().await;
//! ```

mod config;
mod error;
mod scheduler;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use scheduler::DelayScheduler;
