//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed attempt is worth repeating
//! - Track the attempt budget of one call
//! - Produce the delay before the next attempt
//!
//! # Design Decisions
//! - Every call is a POST, so retryability is decided by failure class,
//!   not by HTTP method
//! - Connection errors and timeouts are always retryable
//! - A status is retryable only when it is gateway-like; the caller also
//!   checks the body so a handler's structured error is never repeated

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::Backoff;

/// Statuses that signal a transient upstream condition.
const RETRYABLE_STATUSES: &[u16] = &[408, 413, 429, 500, 502, 503, 504, 521, 522, 524];

pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Attempt budget for a single call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
    attempts: u32,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            backoff: Backoff::from_config(config),
            attempts: 0,
        }
    }

    /// Count one attempt; returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether another attempt is allowed after the current one failed.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay(self.attempts)
    }
}
