//! Segmented job orchestration.
//!
//! Each job runs as a chain of monitor cycles on the scheduler. A cycle
//! lists the queue; if the job's current segment is gone it submits the
//! next one or, with the budget spent, removes the job. A segment that is
//! still listed is checked again after a short delay. Only one cycle per
//! job is ever scheduled at a time, and a job's cycles never overlap: a
//! manual check that finds a cycle in flight does nothing.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::Utc;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use batch_channel::CommandChannel;
use batch_scheduler::{DelayScheduler, SchedulerError};
use batch_types::OrchestratorSettings;

use crate::job::{Job, JobKey, JobState};
use crate::parse::{parse_running_jobs, SubmitOutcome};
use crate::plan::SegmentPlan;
use crate::table::JobTable;
use crate::OrchestratorError;

/// What one monitor cycle decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The segment is still listed; check again after the recheck delay.
    StillRunning,
    /// The segment ended and the next one was submitted.
    Resubmitted { segment: u32, outcome: SubmitOutcome },
    /// The last segment ended; the job was removed.
    Completed,
    /// The job is no longer in the table.
    Gone,
    /// Another cycle for this job was running; nothing was done.
    InFlight,
}

/// Marks a job's cycle as running until dropped.
struct CycleGuard<'a> {
    in_flight: &'a StdMutex<HashSet<JobKey>>,
    key: JobKey,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap().remove(&self.key);
    }
}

struct Inner {
    channel: Arc<dyn CommandChannel>,
    exchange: Mutex<()>,
    jobs: JobTable,
    in_flight: StdMutex<HashSet<JobKey>>,
    scheduler: Arc<DelayScheduler>,
    settings: OrchestratorSettings,
}

/// Submits jobs through a command channel and drives their segments.
///
/// Cheap to clone; clones share the same job table.
#[derive(Clone)]
pub struct JobOrchestrator {
    inner: Arc<Inner>,
}

impl JobOrchestrator {
    /// Create an orchestrator using `channel` for remote commands and
    /// `scheduler` for monitor cycles.
    ///
    /// # Errors
    ///
    /// Returns `OrchestratorError::Config` if `settings` do not validate.
    pub fn new(
        channel: Arc<dyn CommandChannel>,
        scheduler: Arc<DelayScheduler>,
        settings: OrchestratorSettings,
    ) -> Result<Self, OrchestratorError> {
        settings.validate().map_err(OrchestratorError::Config)?;

        Ok(Self {
            inner: Arc::new(Inner {
                channel,
                exchange: Mutex::new(()),
                jobs: JobTable::new(),
                in_flight: StdMutex::new(HashSet::new()),
                scheduler,
                settings,
            }),
        })
    }

    /// Add a job and submit its first segment.
    ///
    /// The first submission is sent before this returns; the first monitor
    /// cycle runs `interval_minutes` later.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if `command` is blank or either number is zero;
    ///   nothing is created.
    /// - `ShutDown` after `shutdown()`.
    /// - `Channel` if the first submission could not be sent. The job stays
    ///   in the table marked failed, with no identifier and no monitoring.
    pub async fn submit(
        &self,
        command: &str,
        interval_minutes: u32,
        max_retries: u32,
    ) -> Result<JobKey, OrchestratorError> {
        if command.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "command must not be empty".to_string(),
            ));
        }
        if interval_minutes == 0 {
            return Err(OrchestratorError::InvalidInput(
                "interval_minutes must be >= 1".to_string(),
            ));
        }
        if max_retries == 0 {
            return Err(OrchestratorError::InvalidInput(
                "max_retries must be >= 1".to_string(),
            ));
        }
        if self.inner.scheduler.is_shut_down() {
            return Err(OrchestratorError::ShutDown);
        }

        let job = Job::new(command, interval_minutes, max_retries);
        let key = job.key;
        let budget = job.segment_budget();
        self.inner.jobs.insert(job);
        info!(job = %key, command, interval_minutes, max_retries, "Job added");

        let guard = self.inner.begin_cycle(key);
        let submitted = self.inner.submit_segment(key).await;
        drop(guard);
        if let Err(e) = submitted {
            self.inner.mark_failed(key, &e);
            return Err(e);
        }

        if let Err(e) = Inner::schedule_monitor(&self.inner, key, budget) {
            let e = OrchestratorError::from(e);
            self.inner.mark_failed(key, &e);
            return Err(e);
        }

        Ok(key)
    }

    /// Add a job described by a [`SegmentPlan`].
    pub async fn submit_plan(&self, plan: &SegmentPlan) -> Result<JobKey, OrchestratorError> {
        self.submit(&plan.command, plan.segment_minutes, plan.segments)
            .await
    }

    /// Snapshot of the live jobs in creation order.
    pub fn list(&self) -> Vec<Job> {
        self.inner.jobs.snapshot()
    }

    /// Snapshot of one job.
    pub fn get(&self, key: JobKey) -> Option<Job> {
        self.inner.jobs.get(key)
    }

    /// Drop a failed job from the table.
    ///
    /// Returns `false` if the job is unknown or still being monitored.
    pub fn forget(&self, key: JobKey) -> bool {
        let removed = self.inner.jobs.remove_failed(key);
        if removed {
            info!(job = %key, "Failed job forgotten");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }

    /// Stop monitoring.
    ///
    /// Pending cycles are cancelled, running ones get the scheduler's grace
    /// period. Jobs stay in the table as they were. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if self.inner.scheduler.is_shut_down() {
            debug!("Orchestrator already shut down");
            return;
        }
        info!(jobs = self.len(), "Shutting down job orchestrator");
        self.inner.scheduler.shutdown().await;
    }

    /// Run one monitor cycle for `key` right now, without rescheduling.
    ///
    /// Returns `CycleOutcome::InFlight` without touching the channel if a
    /// scheduled cycle for the job is running at the same moment.
    pub async fn check_now(&self, key: JobKey) -> Result<CycleOutcome, OrchestratorError> {
        self.inner.monitor_cycle(key).await
    }
}

impl Inner {
    /// One command/response exchange; exchanges never interleave.
    async fn exchange(&self, command: &str) -> Result<String, OrchestratorError> {
        let _guard = self.exchange.lock().await;
        Ok(self.channel.send(command).await?)
    }

    /// Claim the job for one cycle; `None` if a cycle already holds it.
    fn begin_cycle(&self, key: JobKey) -> Option<CycleGuard<'_>> {
        if !self.in_flight.lock().unwrap().insert(key) {
            return None;
        }
        Some(CycleGuard {
            in_flight: &self.in_flight,
            key,
        })
    }

    /// Send the job's command and record the new segment.
    ///
    /// Sends nothing and returns `None` if the job is gone or its segment
    /// budget is already spent.
    async fn submit_segment(
        &self,
        key: JobKey,
    ) -> Result<Option<SubmitOutcome>, OrchestratorError> {
        let Some(job) = self.jobs.get(key) else {
            return Ok(None);
        };
        if job.is_complete() {
            warn!(
                job = %key,
                segments = job.current_retries,
                "Segment budget spent, not submitting"
            );
            return Ok(None);
        }
        let command = job.command;

        let output = self.exchange(&command).await?;
        let outcome = SubmitOutcome::from_output(&output);
        let job_id = outcome.job_id().map(str::to_string);

        let segment = self
            .jobs
            .update(key, |job| {
                job.record_submission(job_id.clone());
                job.current_retries
            })
            .unwrap_or_default();

        match &outcome {
            SubmitOutcome::Accepted(id) => {
                info!(job = %key, job_id = %id, segment, "Segment submitted");
            }
            SubmitOutcome::NoIdentifier => {
                warn!(job = %key, segment, output = %output.trim(), "Submission output has no job id");
            }
        }

        Ok(Some(outcome))
    }

    /// List running queue jobs, retrying transient send failures.
    async fn poll_running(&self) -> Result<HashSet<String>, OrchestratorError> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(self.settings.poll_max_elapsed_secs)),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, "Polling queue status");

            match self.exchange(&self.settings.status_command).await {
                Ok(output) => return Ok(parse_running_jobs(&output)),
                Err(e) => {
                    if attempts >= self.settings.poll_max_attempts {
                        error!(error = %e, attempts, "Queue status poll failed");
                        return Err(e);
                    }

                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis() as u64,
                                "Queue status poll failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => {
                            error!(error = %e, attempts, "Backoff exhausted");
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    async fn monitor_cycle(&self, key: JobKey) -> Result<CycleOutcome, OrchestratorError> {
        let Some(_guard) = self.begin_cycle(key) else {
            debug!(job = %key, "Cycle already in flight");
            return Ok(CycleOutcome::InFlight);
        };
        let Some(job) = self.jobs.get(key) else {
            return Ok(CycleOutcome::Gone);
        };

        let running = self.poll_running().await?;
        self.jobs
            .update(key, |job| job.last_checked_at = Some(Utc::now()));

        let still_running = job
            .job_id
            .as_deref()
            .is_some_and(|id| running.contains(id));

        if still_running {
            self.jobs.update(key, |job| job.state = JobState::Running);
            debug!(job = %key, job_id = ?job.job_id, "Segment still running");
            return Ok(CycleOutcome::StillRunning);
        }

        if !job.is_complete() {
            return Ok(match self.submit_segment(key).await? {
                Some(outcome) => CycleOutcome::Resubmitted {
                    segment: job.current_retries + 1,
                    outcome,
                },
                None => CycleOutcome::Gone,
            });
        }

        self.jobs.remove(key);
        info!(
            job = %key,
            segments = job.current_retries,
            command = %job.command,
            "Job complete"
        );
        Ok(CycleOutcome::Completed)
    }

    /// Run a cycle and schedule its successor.
    fn run_cycle(self: Arc<Self>, key: JobKey) -> BoxFuture<'static, ()> {
        Box::pin(async move {
            let next = match self.monitor_cycle(key).await {
                Ok(CycleOutcome::StillRunning) | Ok(CycleOutcome::InFlight) => {
                    Some(Duration::from_secs(self.settings.recheck_secs))
                }
                Ok(CycleOutcome::Resubmitted { .. }) => {
                    self.jobs.get(key).map(|job| job.segment_budget())
                }
                Ok(CycleOutcome::Completed) | Ok(CycleOutcome::Gone) => None,
                Err(e) => {
                    self.mark_failed(key, &e);
                    None
                }
            };

            if let Some(delay) = next {
                match Self::schedule_monitor(&self, key, delay) {
                    Ok(()) => {}
                    Err(SchedulerError::ShutDown) => {
                        debug!(job = %key, "Scheduler shut down, monitor chain stopped");
                    }
                    Err(e) => {
                        let e = OrchestratorError::from(e);
                        self.mark_failed(key, &e);
                    }
                }
            }
        })
    }

    fn schedule_monitor(
        this: &Arc<Self>,
        key: JobKey,
        delay: Duration,
    ) -> Result<(), SchedulerError> {
        let inner = this.clone();
        this.scheduler
            .schedule(format!("monitor-{}", key), delay, move |_token| {
                inner.run_cycle(key)
            })
    }

    fn mark_failed(&self, key: JobKey, err: &OrchestratorError) {
        error!(job = %key, error = %err, "Job failed, monitoring stopped");
        self.jobs.update(key, |job| job.mark_failed(err.to_string()));
    }
}
