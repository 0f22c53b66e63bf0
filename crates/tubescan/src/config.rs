//! Queue configuration.
//!
//! All knobs have defaults tuned for a single-host deployment; a JSON
//! config file can override any subset of them.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TubescanError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueueConfig {
    /// Number of worker threads executing pipelines.
    pub worker_count: usize,
    /// Maximum jobs in `processing` per user.
    pub per_user_limit: u64,
    /// Maximum jobs in `processing` system-wide.
    pub global_limit: u64,
    /// Dispatcher poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Attempt budget for transient step failures (first try included).
    pub max_attempts: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_base_ms: u64,
    /// Upper bound on the backoff delay.
    pub retry_cap_ms: u64,
    /// Per-step timeout passed to the external collaborators.
    pub step_timeout_secs: u64,
    /// Jobs in `processing` longer than this are force-failed.
    pub stale_processing_max_mins: u64,
    /// Retention window for completed jobs.
    pub retention_days: u64,
    /// Interval between scheduled sweeps.
    pub sweep_interval_mins: u64,
    /// Capacity of the live event broadcast channel.
    pub event_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            per_user_limit: 2,
            global_limit: 8,
            poll_interval_ms: 500,
            max_attempts: 3,
            retry_base_ms: 500,
            retry_cap_ms: 30_000,
            step_timeout_secs: 60,
            stale_processing_max_mins: 30,
            retention_days: 7,
            sweep_interval_mins: 60,
            event_capacity: 100,
        }
    }
}

fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 4)
}

impl QueueConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TubescanError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TubescanError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, TubescanError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| TubescanError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TubescanError> {
        if self.worker_count == 0 {
            return Err(TubescanError::Config("workerCount must be > 0".into()));
        }
        if self.per_user_limit == 0 || self.global_limit == 0 {
            return Err(TubescanError::Config(
                "concurrency limits must be > 0".into(),
            ));
        }
        if self.per_user_limit > self.global_limit {
            return Err(TubescanError::Config(
                "perUserLimit cannot exceed globalLimit".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(TubescanError::Config("maxAttempts must be > 0".into()));
        }
        if self.retry_base_ms == 0 || self.retry_cap_ms < self.retry_base_ms {
            return Err(TubescanError::Config(
                "retryCapMs must be >= retryBaseMs > 0".into(),
            ));
        }
        if self.retention_days == 0 {
            return Err(TubescanError::Config("retentionDays must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(TubescanError::Config("eventCapacity must be > 0".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn stale_processing_max(&self) -> Duration {
        Duration::from_secs(self.stale_processing_max_mins * 60)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days * 24 * 60 * 60)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_mins * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QueueConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.max_attempts, 3);
    }

    #[test]
    fn test_load_partial_override() {
        let config =
            QueueConfig::load_from_str(r#"{"perUserLimit": 4, "globalLimit": 16}"#).unwrap();
        assert_eq!(config.per_user_limit, 4);
        assert_eq!(config.global_limit, 16);
        // Untouched fields keep their defaults.
        assert_eq!(config.poll_interval_ms, 500);
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let err = QueueConfig::load_from_str(r#"{"perUserLimit": 9, "globalLimit": 2}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let err = QueueConfig::load_from_str(r#"{"workerCount": 0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(QueueConfig::load_from_str("not json").is_err());
    }
}
