//! # batch-orchestrator
//!
//! Runs long computations on a batch queue as a series of time-limited
//! segments. A job's command is submitted, the queue is polled until the
//! segment disappears from the running list, and the command is submitted
//! again until the segment budget is used up.
//!
//! ```ignore
//! use std::sync::Arc;
//! use batch_orchestrator::{JobOrchestrator, SegmentPlan};
//!
//! let orchestrator = JobOrchestrator::new(channel, scheduler, settings.orchestrator)?;
//! let plan = SegmentPlan::new("mqrun -np 1 -maxtime 30 run.sh", 120, 4)?;
//! let key = orchestrator.submit_plan(&plan).await?;
//!
//! for job in orchestrator.list() {
//!     println!("{}", job);
//! }
//! orchestrator.shutdown().await;
//! ```

mod error;
mod job;
mod orchestrator;
mod parse;
mod plan;
mod table;

pub use error::OrchestratorError;
pub use job::{Job, JobKey, JobState};
pub use orchestrator::{CycleOutcome, JobOrchestrator};
pub use parse::{parse_job_id, parse_running_jobs, SubmitOutcome, SUBMIT_MARKER};
pub use plan::SegmentPlan;
