//! Scheduler configuration.
//!
//! Sizes the worker pool and bounds how long shutdown waits for
//! callbacks that are already executing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use batch_types::SchedulerSettings;

use crate::SchedulerError;

/// Configuration for the delayed-task scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of callbacks executing at the same time.
    /// Callbacks whose delay has elapsed queue for a free slot.
    /// Defaults to 5.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Timeout in seconds for graceful shutdown.
    /// Executing callbacks get this much time to complete before they are
    /// cancelled. Defaults to 60 seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_shutdown_timeout() -> u64 {
    60
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl SchedulerConfig {
    /// Check the pool can run at least one callback.
    ///
    /// # Errors
    ///
    /// Returns `SchedulerError::InvalidConfig` if `max_concurrent` is zero.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrent == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrent must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Shutdown grace period as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            max_concurrent: settings.max_concurrent,
            shutdown_timeout_secs: settings.shutdown_timeout_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.shutdown_timeout_secs, 60);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = SchedulerConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(SchedulerError::InvalidConfig(msg)) => assert!(msg.contains("max_concurrent")),
            other => panic!("Expected InvalidConfig error, got {:?}", other),
        }
    }

    #[test]
    fn test_serde_defaults() {
        let parsed: SchedulerConfig = serde_json::from_str(r#"{"max_concurrent": 2}"#).unwrap();
        assert_eq!(parsed.max_concurrent, 2);
        assert_eq!(parsed.shutdown_timeout_secs, 60);
    }

    #[test]
    fn test_from_settings() {
        let settings = SchedulerSettings {
            max_concurrent: 3,
            shutdown_timeout_secs: 15,
        };
        let config = SchedulerConfig::from(&settings);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(15));
    }
}
