//! Configuration loading for batch-relay.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/batch-relay/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::BatchError;

/// How the remote shell session is spawned.
///
/// The session is a long-lived process whose stdin receives commands and
/// whose stdout/stderr carry the replies, typically `ssh <host>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Program to spawn (default: "ssh")
    #[serde(default = "default_shell_program")]
    pub program: String,

    /// Arguments passed to the program, usually the target host.
    #[serde(default)]
    pub args: Vec<String>,

    /// Time to wait after writing a command before collecting its output.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

fn default_shell_program() -> String {
    "ssh".to_string()
}

fn default_settle_ms() -> u64 {
    500
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            program: default_shell_program(),
            args: Vec::new(),
            settle_ms: default_settle_ms(),
        }
    }
}

impl ShellSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.program.trim().is_empty() {
            return Err("shell.program must not be empty".to_string());
        }
        if self.settle_ms == 0 {
            return Err("shell.settle_ms must be > 0".to_string());
        }
        Ok(())
    }
}

/// Worker pool sizing and shutdown grace period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Maximum number of callbacks executing at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Grace period for in-flight callbacks on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_shutdown_timeout() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl SchedulerSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent == 0 {
            return Err("scheduler.max_concurrent must be > 0".to_string());
        }
        Ok(())
    }
}

/// Job monitoring policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorSettings {
    /// Command that lists the running jobs of the remote queue.
    #[serde(default = "default_status_command")]
    pub status_command: String,

    /// Delay before checking again on a segment that is still running.
    #[serde(default = "default_recheck_secs")]
    pub recheck_secs: u64,

    /// Maximum attempts for one status poll before the job is marked failed.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,

    /// Upper bound on the time spent retrying one status poll. Must be > 0.
    #[serde(default = "default_poll_max_elapsed")]
    pub poll_max_elapsed_secs: u64,
}

fn default_status_command() -> String {
    "mps".to_string()
}

fn default_recheck_secs() -> u64 {
    10
}

fn default_poll_max_attempts() -> u32 {
    3
}

fn default_poll_max_elapsed() -> u64 {
    30
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            status_command: default_status_command(),
            recheck_secs: default_recheck_secs(),
            poll_max_attempts: default_poll_max_attempts(),
            poll_max_elapsed_secs: default_poll_max_elapsed(),
        }
    }
}

impl OrchestratorSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.status_command.trim().is_empty() {
            return Err("orchestrator.status_command must not be empty".to_string());
        }
        if self.recheck_secs == 0 {
            return Err("orchestrator.recheck_secs must be > 0".to_string());
        }
        if self.poll_max_attempts == 0 {
            return Err("orchestrator.poll_max_attempts must be > 0".to_string());
        }
        if self.poll_max_elapsed_secs == 0 {
            return Err("orchestrator.poll_max_elapsed_secs must be > 0".to_string());
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub shell: ShellSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            shell: ShellSettings::default(),
            scheduler: SchedulerSettings::default(),
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/batch-relay/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (BATCH_*, sections split by `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, BatchError> {
        let config_dir = ProjectDirs::from("", "", "batch-relay")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default("shell.program", default_shell_program())
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default("shell.settle_ms", default_settle_ms())
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default("scheduler.max_concurrent", default_max_concurrent() as u64)
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default(
                "scheduler.shutdown_timeout_secs",
                default_shutdown_timeout(),
            )
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default("orchestrator.status_command", default_status_command())
            .map_err(|e| BatchError::Config(e.to_string()))?
            .set_default("orchestrator.recheck_secs", default_recheck_secs())
            .map_err(|e| BatchError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: BATCH_LOG_LEVEL, BATCH_SHELL__SETTLE_MS, BATCH_ORCHESTRATOR__RECHECK_SECS
        builder = builder.add_source(
            Environment::with_prefix("BATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| BatchError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| BatchError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), BatchError> {
        self.shell.validate().map_err(BatchError::Config)?;
        self.scheduler.validate().map_err(BatchError::Config)?;
        self.orchestrator.validate().map_err(BatchError::Config)?;
        Ok(())
    }
}
