//! Retry policy for summary delivery.
//!
//! # Responsibilities
//! - Bound the number of delivery attempts per summary
//! - Space attempts at a fixed cadence
//!
//! # Design Decisions
//! - Fixed interval, no exponential growth, no jitter
//! - Every failed attempt is followed by one interval, the last one included,
//!   so an exhausted summary holds its consumer for `max_attempts` intervals

use std::time::Duration;

use crate::config::RetryConfig;

/// How often, and how many times, to try a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 15;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    /// `max_attempts` is clamped to at least one.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait after each failed attempt.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sleep time an exhausted summary accumulates.
    pub fn total_backoff(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::fixed(config.max_attempts, Duration::from_millis(config.interval_ms))
    }
}
