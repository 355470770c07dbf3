//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;

/// Delay schedule between attempts of one call.
///
/// The wait after attempt `n` is `base * 2^(n-1)`, capped at `max`, plus up
/// to 10% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms)
    }

    /// Wait after `attempts` failed attempts, using the thread RNG.
    pub fn delay(&self, attempts: u32) -> Duration {
        self.delay_with(attempts, &mut rand::thread_rng())
    }

    /// Same as [`delay`](Self::delay) with a caller-provided RNG.
    pub fn delay_with<R: Rng + ?Sized>(&self, attempts: u32, rng: &mut R) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }

        let capped = self.ceiling(attempts);
        let jitter_range = capped / 10;
        let jitter = if jitter_range > 0 {
            rng.gen_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped + jitter)
    }

    /// Delay before jitter.
    fn ceiling(&self, attempts: u32) -> u64 {
        let factor = 2u64.saturating_pow(attempts - 1);
        self.base_ms.saturating_mul(factor).min(self.max_ms)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
