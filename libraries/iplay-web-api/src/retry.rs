//! Backoff for rate-limited read requests

use std::time::Duration;

/// Retry schedule for `429 Too Many Requests` on GET requests
///
/// A positive `Retry-After` wins; otherwise the delay doubles from
/// `base_delay` on each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(350),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retrying after `attempt` (0-based) was rate limited
    pub fn backoff(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        match retry_after_secs.filter(|secs| *secs > 0) {
            Some(secs) => Duration::from_secs(secs),
            None => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

/// Whole seconds to report to callers, at least one
pub(crate) fn ceil_secs(delay: Duration) -> u64 {
    let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
    secs.max(1)
}
