use std::cmp::min;
use std::time::Duration;

use crate::config::UploadConfig;
use crate::transport::HttpResponse;

/// Attempt budget and exponential backoff for a single upload segment.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&UploadConfig::default())
    }
}

impl From<&UploadConfig> for RetryPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            exponential_base: config.exponential_base,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.base_delay.as_millis() as f64
            * self
                .exponential_base
                .powi(attempt.saturating_sub(1) as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        min(delay, self.max_delay)
    }

    /// Honour a server-provided `Retry-After` (seconds), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32, response: Option<&HttpResponse>) -> Duration {
        response
            .and_then(|r| r.header("retry-after"))
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| {
                // Values past max_delay may not fit in a Duration at all.
                if secs >= self.max_delay.as_secs_f64() {
                    self.max_delay
                } else {
                    Duration::from_secs_f64(secs)
                }
            })
            .unwrap_or_else(|| self.backoff_delay(attempt))
    }
}

/// 5xx, rate limiting and request timeouts are transient.
pub fn should_retry_status(status: u16) -> bool {
    matches!(status, 408 | 429) || (500..600).contains(&status)
}
