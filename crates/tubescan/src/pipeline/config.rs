use std::time::Duration;

use crate::config::QueueConfig;

/// Retry and timeout knobs for a single pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Total tries per step, first attempt included.
    pub max_attempts: u32,
    pub retry_base: Duration,
    pub retry_cap: Duration,
    pub step_timeout: Duration,
}

impl PipelineConfig {
    pub fn from_queue_config(config: &QueueConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            retry_base: Duration::from_millis(config.retry_base_ms),
            retry_cap: Duration::from_millis(config.retry_cap_ms),
            step_timeout: config.step_timeout(),
        }
    }

    /// Delay before retry number `attempt` (1-based): base doubled per
    /// attempt, capped.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.retry_base.saturating_mul(factor).min(self.retry_cap)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_queue_config(&QueueConfig::default())
    }
}
