//! Command implementations for batch-daemon.
//!
//! Handles:
//! - submit: run one segmented job to completion
//! - session: interactive job management over stdin
//! - template: print the default command for a program

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{info, warn};

use batch_channel::ShellChannel;
use batch_orchestrator::{JobOrchestrator, SegmentPlan};
use batch_scheduler::{DelayScheduler, SchedulerConfig};
use batch_types::Settings;

use crate::session::{execute, Reply, SessionCommand, HELP};

/// Load settings and apply CLI overrides.
fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    host: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(host) = host {
        settings.shell.args.push(host.to_string());
    }
    Ok(settings)
}

/// Logs go to stderr so job output on stdout stays readable.
fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Connect the remote session and build the orchestrator on top of it.
async fn start(settings: &Settings) -> Result<(Arc<ShellChannel>, JobOrchestrator)> {
    info!("Configuration:");
    info!(
        "  Shell: {} {}",
        settings.shell.program,
        settings.shell.args.join(" ")
    );
    info!("  Status command: {}", settings.orchestrator.status_command);
    info!("  Max concurrent: {}", settings.scheduler.max_concurrent);

    let channel = Arc::new(
        ShellChannel::connect(&settings.shell)
            .await
            .context("Failed to open remote session")?,
    );

    let scheduler = DelayScheduler::new(SchedulerConfig::from(&settings.scheduler))
        .context("Failed to create scheduler")?;

    let orchestrator = JobOrchestrator::new(
        channel.clone(),
        Arc::new(scheduler),
        settings.orchestrator.clone(),
    )
    .context("Failed to create orchestrator")?;

    Ok((channel, orchestrator))
}

/// Stop monitoring first, then close the session it was using.
async fn stop(channel: &ShellChannel, orchestrator: &JobOrchestrator) {
    orchestrator.shutdown().await;
    channel.disconnect().await;
    info!("Shutdown complete");
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

/// Submit one segmented job and report on it until it leaves the table.
///
/// Fails if the job ends in the failed state.
pub async fn submit_job(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    host: Option<&str>,
    total_minutes: &str,
    segments: &str,
    report_secs: u64,
    command: &[String],
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override, host)?;
    init_logging(&settings)?;

    let plan = SegmentPlan::from_fields(&command.join(" "), total_minutes, segments)?;
    info!(
        "Running {} segment(s) of {} min: {}",
        plan.segments, plan.segment_minutes, plan.command
    );

    let (channel, orchestrator) = start(&settings).await?;

    let key = match orchestrator.submit_plan(&plan).await {
        Ok(key) => key,
        Err(e) => {
            stop(&channel, &orchestrator).await;
            return Err(e).context("Failed to submit first segment");
        }
    };
    println!("submitted {}", key);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut report = tokio::time::interval(Duration::from_secs(report_secs.max(1)));

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            _ = report.tick() => match orchestrator.get(key) {
                None => {
                    println!("{} complete after {} segment(s)", key, plan.segments);
                    break Ok(());
                }
                Some(job) if job.is_failed() => {
                    println!("{}", job);
                    break Err(anyhow::anyhow!("Job {} failed: {}", key, job.state));
                }
                Some(job) => println!("{}", job),
            },
        }
    };

    stop(&channel, &orchestrator).await;
    result
}

/// Interactive session reading commands from stdin until `quit`, EOF or a
/// shutdown signal.
pub async fn run_session(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    host: Option<&str>,
) -> Result<()> {
    let settings = load_settings(config_path, log_level_override, host)?;
    init_logging(&settings)?;

    let (channel, orchestrator) = start(&settings).await?;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            _ = &mut shutdown => break Ok(()),
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e).context("Failed to read stdin"),
                };
                match SessionCommand::parse(&line) {
                    Ok(command) => match execute(&orchestrator, command).await {
                        Reply::Print(text) if text.is_empty() => {}
                        Reply::Print(text) => println!("{}", text),
                        Reply::Quit => break Ok(()),
                    },
                    Err(msg) => println!("error: {}", msg),
                }
            }
        }
    };

    stop(&channel, &orchestrator).await;
    result
}

/// Print the default command template for `path`.
pub fn show_template(path: &str) {
    println!("{}", SegmentPlan::default_command(path));
}
