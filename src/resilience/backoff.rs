//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Retry schedule for calls to upstream APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, 0, 0)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_delay_ms, self.max_delay_ms)
    }
}

impl From<&crate::config::MarketConfig> for RetryPolicy {
    fn from(config: &crate::config::MarketConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay_ms, config.max_delay_ms)
    }
}

/// Delay for `attempt`: base * 2^(attempt-1), capped at `max_ms`, plus up to 10% jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
