//! Exponential backoff for rate-limited and transient API failures.
//!
//! A [`Backoff`] is created fresh for every logical call and dropped once the
//! call succeeds or gives up. Delays follow `base_delay * 2^attempt`, capped at
//! `max_delay`, unless the server supplied a `Retry-After` hint.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::config::RetryConfig;

/// Per-call backoff state.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: u32,
}

impl Backoff {
    /// Start a new backoff sequence at attempt 0.
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            max_attempts: config.max_attempts,
        }
    }

    /// Zero-based index of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay for a given attempt number, ignoring any server hint.
    ///
    /// Uses exponential backoff: `base_delay * 2^attempt`
    /// Capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Advance to the next attempt after a retryable failure.
    ///
    /// Returns the delay to sleep before retrying, or `None` when the attempt
    /// budget is spent and the caller must give up.
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Option<Duration> {
        if self.attempt + 1 >= self.max_attempts {
            return None;
        }

        let delay = hint
            .map(|h| h.min(self.max_delay))
            .unwrap_or_else(|| self.delay_for_attempt(self.attempt));
        self.attempt += 1;
        Some(delay)
    }
}

/// Parse a `Retry-After` header given in whole seconds.
///
/// HTTP-date values are ignored and fall back to computed backoff.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
