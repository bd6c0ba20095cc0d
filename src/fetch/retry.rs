//! Backoff policy for HTTP 429 responses.

use std::time::Duration;

use crate::config::{BackoffStrategy, RateLimitConfig};

#[derive(Debug, Clone)]
pub struct RateLimitPolicy {
    strategy: BackoffStrategy,
    initial: Duration,
    max: Duration,
    max_retries: u32,
}

impl RateLimitPolicy {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            strategy: config.strategy,
            initial: Duration::from_millis(config.initial_backoff_ms),
            max: Duration::from_millis(config.max_backoff_ms),
            max_retries: config.max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt` (1-based), or `None` once the
    /// retry budget for the page is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_retries {
            return None;
        }

        let delay = match self.strategy {
            BackoffStrategy::Fixed => self.initial,
            BackoffStrategy::Exponential => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                self.initial.saturating_mul(factor)
            }
        };

        Some(delay.min(self.max))
    }
}
