//! The orchestrated job record.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Local handle for a job, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey(Ulid);

impl JobKey {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobKey {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s.trim()).map(JobKey)
    }
}

/// Where a job is in its lifecycle.
///
/// Completed jobs leave the live collection, so they have no state here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    /// A segment was sent and has not been seen running yet.
    Submitted,
    /// The current segment was listed by the queue on the last check.
    Running,
    /// The monitor chain stopped on a communication error.
    Failed { reason: String },
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Running => write!(f, "running"),
            JobState::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// One remote computation split into consecutive segments.
///
/// `current_retries` counts submissions sent so far, the first included,
/// and never exceeds `max_retries`. `job_id` belongs to the most recent
/// submission only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub key: JobKey,
    /// Remote command line sent for every segment.
    pub command: String,
    /// Per-segment budget and delay before a segment is first checked.
    pub interval_minutes: u32,
    /// Total number of segments allowed.
    pub max_retries: u32,
    /// Segments submitted so far.
    pub current_retries: u32,
    /// Queue identifier of the latest segment, if the queue reported one.
    pub job_id: Option<String>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub last_submitted_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a job that has not been submitted yet.
    pub fn new(command: impl Into<String>, interval_minutes: u32, max_retries: u32) -> Self {
        Self {
            key: JobKey::new(),
            command: command.into(),
            interval_minutes,
            max_retries,
            current_retries: 0,
            job_id: None,
            state: JobState::Submitted,
            created_at: Utc::now(),
            last_submitted_at: None,
            last_checked_at: None,
        }
    }

    /// True once every allowed segment has been submitted.
    pub fn is_complete(&self) -> bool {
        self.current_retries >= self.max_retries
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.state, JobState::Failed { .. })
    }

    /// Wall-clock budget of one segment.
    pub fn segment_budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }

    /// Record a sent submission and the identifier it produced.
    ///
    /// Callers must not submit once `is_complete()` holds.
    pub(crate) fn record_submission(&mut self, job_id: Option<String>) {
        self.current_retries += 1;
        self.job_id = job_id;
        self.state = JobState::Submitted;
        self.last_submitted_at = Some(Utc::now());
    }

    pub(crate) fn mark_failed(&mut self, reason: impl Into<String>) {
        self.state = JobState::Failed {
            reason: reason.into(),
        };
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}  job {}  segment {}/{}  {} min/segment  {}  {}",
            self.key,
            self.job_id.as_deref().unwrap_or("-"),
            self.current_retries,
            self.max_retries,
            self.interval_minutes,
            self.state,
            self.command
        )
    }
}
