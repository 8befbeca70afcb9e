//! Delayed task execution on a bounded pool.
//!
//! Callbacks are spawned on the tokio runtime, sleep for their delay, then
//! wait for one of `max_concurrent` execution slots. Shutdown cancels
//! everything still waiting and gives executing callbacks a grace period
//! before cancelling them too.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::{SchedulerConfig, SchedulerError};

/// Scheduler owning a bounded pool of delayed callbacks.
///
/// The scheduler is an explicit object with a create -> use -> shutdown
/// lifecycle. Share it with `Arc` between the components that schedule
/// work; callbacks that reschedule themselves hold a clone of that `Arc`.
pub struct DelayScheduler {
    config: SchedulerConfig,
    slots: Arc<Semaphore>,
    tracker: TaskTracker,
    shutdown_token: CancellationToken,
    abort_token: CancellationToken,
    is_shut_down: AtomicBool,
    executing: Arc<AtomicUsize>,
}

impl DelayScheduler {
    /// Create a new scheduler with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if the configuration does
    /// not validate.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;

        Ok(Self {
            slots: Arc::new(Semaphore::new(config.max_concurrent)),
            config,
            tracker: TaskTracker::new(),
            shutdown_token: CancellationToken::new(),
            abort_token: CancellationToken::new(),
            is_shut_down: AtomicBool::new(false),
            executing: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Run `task` once after `delay`.
    ///
    /// The task receives a clone of the shutdown token so long-running work
    /// can notice shutdown and stop early. Must be called from within a
    /// tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::ShutDown` once `shutdown()` has been called.
    pub fn schedule<F, Fut>(
        &self,
        name: impl Into<String>,
        delay: Duration,
        task: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down.load(Ordering::SeqCst) {
            return Err(SchedulerError::ShutDown);
        }

        let name = name.into();
        let shutdown = self.shutdown_token.clone();
        let abort = self.abort_token.clone();
        let slots = self.slots.clone();
        let executing = self.executing.clone();

        debug!(task = %name, delay_ms = delay.as_millis() as u64, "Task scheduled");

        self.tracker.spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(task = %name, "Task cancelled before its delay elapsed");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            let _slot = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(task = %name, "Task cancelled while waiting for a worker slot");
                    return;
                }
                slot = slots.acquire_owned() => match slot {
                    Ok(slot) => slot,
                    Err(_) => return,
                },
            };

            executing.fetch_add(1, Ordering::SeqCst);
            let start = Instant::now();

            tokio::select! {
                _ = task(shutdown.clone()) => {
                    debug!(
                        task = %name,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Task completed"
                    );
                }
                _ = abort.cancelled() => {
                    warn!(task = %name, "Task aborted after shutdown grace period");
                }
            }

            executing.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }

    /// Shutdown the scheduler.
    ///
    /// Cancels every task still waiting on its delay or for a worker slot,
    /// waits up to `shutdown_timeout_secs` for executing tasks, then
    /// cancels whatever is left. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.is_shut_down.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already shut down");
            return;
        }

        info!(
            executing = self.executing(),
            pending = self.pending(),
            "Initiating scheduler shutdown"
        );

        self.tracker.close();
        self.shutdown_token.cancel();

        let grace = self.config.shutdown_timeout();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            warn!(
                executing = self.executing(),
                grace_secs = grace.as_secs(),
                "Executing tasks did not finish in time, aborting"
            );
            self.abort_token.cancel();
            self.tracker.wait().await;
        }

        info!("Scheduler shutdown complete");
    }

    /// Get a clone of the shutdown token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Check if `shutdown()` has been called.
    pub fn is_shut_down(&self) -> bool {
        self.is_shut_down.load(Ordering::SeqCst)
    }

    /// Number of tasks currently executing their callback.
    pub fn executing(&self) -> usize {
        self.executing.load(Ordering::SeqCst)
    }

    /// Number of tasks still waiting on their delay or a worker slot.
    pub fn pending(&self) -> usize {
        self.tracker.len().saturating_sub(self.executing())
    }
}
