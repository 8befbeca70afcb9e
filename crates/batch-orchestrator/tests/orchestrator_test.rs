//! Orchestrator behaviour against an in-memory batch queue.
//!
//! All tests run on paused tokio time, so minute-long segment budgets
//! elapse instantly and deterministically.

use std::sync::Arc;
use std::time::Duration;

use batch_channel::ScriptedChannel;
use batch_orchestrator::{CycleOutcome, JobOrchestrator, JobState, OrchestratorError, SegmentPlan};
use batch_scheduler::{DelayScheduler, SchedulerConfig};
use batch_types::OrchestratorSettings;

/// Orchestrator wired to a scripted queue.
struct Harness {
    channel: Arc<ScriptedChannel>,
    scheduler: Arc<DelayScheduler>,
    orchestrator: JobOrchestrator,
}

impl Harness {
    fn new() -> Self {
        Self::with_channel(ScriptedChannel::new("mps"))
    }

    fn with_channel(channel: ScriptedChannel) -> Self {
        let channel = Arc::new(channel);
        let scheduler = Arc::new(
            DelayScheduler::new(SchedulerConfig {
                max_concurrent: 5,
                shutdown_timeout_secs: 1,
            })
            .unwrap(),
        );
        let orchestrator = JobOrchestrator::new(
            channel.clone(),
            scheduler.clone(),
            OrchestratorSettings::default(),
        )
        .unwrap();

        Self {
            channel,
            scheduler,
            orchestrator,
        }
    }

    fn assert_retry_bounds(&self) {
        for job in self.orchestrator.list() {
            assert!(
                job.current_retries <= job.max_retries,
                "job {} ran {} of {} segments",
                job.key,
                job.current_retries,
                job.max_retries
            );
        }
    }
}

async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}

#[tokio::test(start_paused = true)]
async fn test_two_segment_job_runs_to_completion() {
    let h = Harness::new();

    let key = h.orchestrator.submit("run.sh", 1, 2).await.unwrap();
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.job_id.as_deref(), Some("100"));
    assert_eq!(job.current_retries, 1);
    assert_eq!(job.state, JobState::Submitted);
    assert_eq!(h.channel.submissions(), 1);

    // Nothing happens before the segment budget elapses
    advance(59).await;
    assert_eq!(h.channel.polls(), 0);

    // First cycle: 100 is gone from the queue, resubmit
    advance(2).await;
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.job_id.as_deref(), Some("101"));
    assert_eq!(job.current_retries, 2);
    assert_eq!(h.channel.polls(), 1);
    h.assert_retry_bounds();

    // Second cycle: 101 is gone and the budget is spent
    advance(60).await;
    assert!(h.orchestrator.get(key).is_none());
    assert!(h.orchestrator.is_empty());
    assert_eq!(h.channel.submissions(), 2);
    assert_eq!(h.channel.polls(), 2);
    assert_eq!(h.scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_running_segment_is_rechecked_without_resubmitting() {
    let h = Harness::new();
    h.channel.set_auto_run(true);

    let key = h.orchestrator.submit("run.sh", 1, 2).await.unwrap();

    advance(61).await;
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.state, JobState::Running);
    assert_eq!(job.current_retries, 1);
    assert_eq!(h.channel.polls(), 1);
    assert!(job.last_checked_at.is_some());

    // Rechecked on the short delay, not the segment budget
    advance(10).await;
    assert_eq!(h.channel.polls(), 2);
    assert_eq!(h.orchestrator.get(key).unwrap().current_retries, 1);

    h.channel.set_running("100", false);
    advance(10).await;
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.current_retries, 2);
    assert_eq!(job.job_id.as_deref(), Some("101"));
    assert_eq!(job.state, JobState::Submitted);
}

#[tokio::test(start_paused = true)]
async fn test_missing_job_id_is_not_an_error() {
    let h = Harness::new();
    h.channel.set_omit_job_ids(true);

    let key = h.orchestrator.submit("run.sh", 1, 3).await.unwrap();
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.job_id, None);
    assert_eq!(job.current_retries, 1);

    // A job without an identifier can never be listed as running
    h.channel.set_omit_job_ids(false);
    advance(61).await;
    let job = h.orchestrator.get(key).unwrap();
    assert_eq!(job.current_retries, 2);
    assert_eq!(job.job_id.as_deref(), Some("101"));
}

#[tokio::test(start_paused = true)]
async fn test_single_segment_job_is_removed_after_first_check() {
    let h = Harness::new();

    h.orchestrator.submit("run.sh", 5, 1).await.unwrap();
    assert_eq!(h.orchestrator.len(), 1);

    advance(301).await;
    assert!(h.orchestrator.is_empty());
    assert_eq!(h.channel.submissions(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_input_has_no_side_effects() {
    let h = Harness::new();

    for (command, interval, retries) in [("", 1, 1), ("  ", 1, 1), ("run.sh", 0, 1), ("run.sh", 1, 0)] {
        let result = h.orchestrator.submit(command, interval, retries).await;
        assert!(matches!(result, Err(OrchestratorError::InvalidInput(_))));
    }

    assert!(h.orchestrator.is_empty());
    assert!(h.channel.sent().is_empty());
    assert_eq!(h.scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_submission_registers_failed_job() {
    let h = Harness::new();
    h.channel.set_connected(false);

    let result = h.orchestrator.submit("run.sh", 1, 2).await;
    assert!(matches!(result, Err(OrchestratorError::Channel(_))));

    let jobs = h.orchestrator.list();
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].is_failed());
    assert_eq!(jobs[0].job_id, None);
    assert_eq!(jobs[0].current_retries, 0);
    assert_eq!(h.scheduler.pending(), 0);

    advance(600).await;
    assert_eq!(h.channel.polls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_transient_poll_failures_are_retried() {
    let h = Harness::new();
    let key = h.orchestrator.submit("run.sh", 1, 2).await.unwrap();

    h.channel.fail_next(2);
    advance(90).await;

    let job = h.orchestrator.get(key).unwrap();
    assert!(!job.is_failed());
    assert_eq!(job.current_retries, 2);
    assert!(h.channel.polls() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_persistent_poll_failure_marks_job_failed() {
    let h = Harness::new();
    let key = h.orchestrator.submit("run.sh", 1, 2).await.unwrap();

    h.channel.set_connected(false);
    advance(120).await;

    let job = h.orchestrator.get(key).unwrap();
    match &job.state {
        JobState::Failed { reason } => assert!(reason.contains("not connected")),
        other => panic!("Expected failed job, got {:?}", other),
    }
    assert_eq!(job.current_retries, 1);

    // The chain has stopped
    let polls = h.channel.polls();
    assert_eq!(polls, 3);
    advance(3600).await;
    assert_eq!(h.channel.polls(), polls);
    assert_eq!(h.scheduler.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_resubmission_marks_job_failed() {
    let h = Harness::new();
    let key = h.orchestrator.submit("run.sh", 1, 3).await.unwrap();

    h.channel.set_reject_submissions(true);
    advance(61).await;

    let job = h.orchestrator.get(key).unwrap();
    assert!(job.is_failed());
    // Segment counter only moves when a submission was actually sent
    assert_eq!(job.current_retries, 1);
    assert_eq!(job.job_id.as_deref(), Some("100"));
}

#[tokio::test(start_paused = true)]
async fn test_forget_only_drops_failed_jobs() {
    let h = Harness::new();
    let healthy = h.orchestrator.submit("ok.sh", 1, 2).await.unwrap();

    h.channel.set_connected(false);
    let _ = h.orchestrator.submit("broken.sh", 1, 2).await;
    let broken = h
        .orchestrator
        .list()
        .into_iter()
        .find(|job| job.is_failed())
        .map(|job| job.key)
        .unwrap();

    assert!(!h.orchestrator.forget(healthy));
    assert!(h.orchestrator.forget(broken));
    assert!(!h.orchestrator.forget(broken));
    assert_eq!(h.orchestrator.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_progress_independently() {
    let h = Harness::new();

    let short = h.orchestrator.submit("short.sh", 1, 1).await.unwrap();
    let long = h.orchestrator.submit("long.sh", 2, 3).await.unwrap();

    advance(61).await;
    assert!(h.orchestrator.get(short).is_none());
    assert_eq!(h.orchestrator.get(long).unwrap().current_retries, 1);

    advance(60).await;
    assert_eq!(h.orchestrator.get(long).unwrap().current_retries, 2);
    h.assert_retry_bounds();

    advance(240).await;
    assert!(h.orchestrator.is_empty());
    assert_eq!(h.channel.submissions(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_list_keeps_submission_order() {
    let h = Harness::new();
    for name in ["a.sh", "b.sh", "c.sh"] {
        h.orchestrator.submit(name, 5, 2).await.unwrap();
    }

    let commands: Vec<String> = h
        .orchestrator
        .list()
        .into_iter()
        .map(|job| job.command)
        .collect();
    assert_eq!(commands, vec!["a.sh", "b.sh", "c.sh"]);
}

#[tokio::test(start_paused = true)]
async fn test_channel_exchanges_never_overlap() {
    let h = Harness::with_channel(
        ScriptedChannel::new("mps").with_latency(Duration::from_millis(500)),
    );

    let (a, b, c) = tokio::join!(
        h.orchestrator.submit("a.sh", 1, 3),
        h.orchestrator.submit("b.sh", 1, 3),
        h.orchestrator.submit("c.sh", 1, 3),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    // All three monitor chains fire around the same time
    advance(180).await;

    assert!(h.channel.polls() >= 3);
    assert_eq!(h.channel.peak_concurrency(), 1);
    h.assert_retry_bounds();
}

#[tokio::test(start_paused = true)]
async fn test_submit_plan() {
    let h = Harness::new();
    let plan = SegmentPlan::from_fields("mqrun -np 1 -maxtime 30 run.sh", "120", "4").unwrap();

    let key = h.orchestrator.submit_plan(&plan).await.unwrap();
    let job = h.orchestrator.get(key).unwrap();

    assert_eq!(job.command, "mqrun -np 1 -maxtime 30 run.sh");
    assert_eq!(job.interval_minutes, 30);
    assert_eq!(job.max_retries, 4);
    assert_eq!(h.channel.sent(), vec!["mqrun -np 1 -maxtime 30 run.sh"]);
}

#[tokio::test(start_paused = true)]
async fn test_check_now_runs_a_single_cycle() {
    let h = Harness::new();
    h.channel.set_auto_run(true);
    let key = h.orchestrator.submit("run.sh", 30, 2).await.unwrap();

    let outcome = h.orchestrator.check_now(key).await.unwrap();
    assert_eq!(outcome, CycleOutcome::StillRunning);

    h.channel.set_running("100", false);
    let outcome = h.orchestrator.check_now(key).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Resubmitted { segment: 2, .. }));

    h.channel.set_running("101", false);
    let outcome = h.orchestrator.check_now(key).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed);

    let outcome = h.orchestrator.check_now(key).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Gone);
}

#[tokio::test(start_paused = true)]
async fn test_manual_check_during_scheduled_cycle_does_not_resubmit() {
    let h = Harness::with_channel(
        ScriptedChannel::new("mps").with_latency(Duration::from_millis(500)),
    );
    let key = h.orchestrator.submit("run.sh", 1, 2).await.unwrap();

    // The scheduled cycle starts at 60.5 s and is still polling at 60.6 s
    tokio::time::sleep(Duration::from_millis(60_100)).await;
    let outcome = h.orchestrator.check_now(key).await.unwrap();
    assert_eq!(outcome, CycleOutcome::InFlight);

    advance(5).await;
    assert_eq!(h.channel.submissions(), 2);
    assert_eq!(h.orchestrator.get(key).unwrap().current_retries, 2);
    h.assert_retry_bounds();

    advance(120).await;
    assert!(h.orchestrator.get(key).is_none());
    assert_eq!(h.channel.submissions(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_monitoring_and_is_idempotent() {
    let h = Harness::new();
    let key = h.orchestrator.submit("run.sh", 1, 5).await.unwrap();
    assert_eq!(h.scheduler.pending(), 1);

    h.orchestrator.shutdown().await;
    h.orchestrator.shutdown().await;
    assert!(h.scheduler.is_shut_down());

    advance(3600).await;
    assert_eq!(h.channel.polls(), 0);
    // Jobs are left as they were
    assert_eq!(h.orchestrator.get(key).unwrap().current_retries, 1);

    let result = h.orchestrator.submit("late.sh", 1, 1).await;
    assert!(matches!(result, Err(OrchestratorError::ShutDown)));
    assert_eq!(h.orchestrator.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_settings_rejected() {
    let scheduler = Arc::new(DelayScheduler::new(SchedulerConfig::default()).unwrap());
    let settings = OrchestratorSettings {
        recheck_secs: 0,
        ..Default::default()
    };

    let result = JobOrchestrator::new(Arc::new(ScriptedChannel::new("mps")), scheduler, settings);
    assert!(matches!(result, Err(OrchestratorError::Config(_))));
}
