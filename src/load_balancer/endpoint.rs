//! Upstream endpoint abstraction.
//!
//! # Responsibilities
//! - Represent a single configured server
//! - Count dispatches routed to it (for Least Connections LB)
//! - Keep a bounded latency history (for latency-aware LBs)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use url::Url;

use crate::config::ClientTlsConfig;

/// Latency samples kept per endpoint; the oldest is evicted first.
pub const HISTORY_LIMIT: usize = 10;

/// A single upstream server.
#[derive(Debug)]
pub struct Endpoint {
    /// Where requests are posted.
    pub url: Url,
    /// Optional CA / identity material.
    pub tls: Option<ClientTlsConfig>,
    /// Secret key sent in the envelope credentials.
    pub secret_key: Option<String>,
    /// Completed dispatches routed here.
    active_requests: AtomicUsize,
    /// Most recent round-trip times, oldest first.
    latencies: Mutex<VecDeque<Duration>>,
}

impl Endpoint {
    pub fn new(url: Url, tls: Option<ClientTlsConfig>, secret_key: Option<String>) -> Self {
        Self {
            url,
            tls,
            secret_key,
            active_requests: AtomicUsize::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT + 1)),
        }
    }

    /// Get the current request count.
    pub fn active_requests(&self) -> usize {
        self.active_requests.load(Ordering::Relaxed)
    }

    /// Increment the request count, returning the new value.
    pub fn inc_requests(&self) -> usize {
        self.active_requests.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Append a latency sample, evicting the oldest past [`HISTORY_LIMIT`].
    pub fn record_latency(&self, latency: Duration) {
        let mut history = self.latencies.lock().unwrap_or_else(PoisonError::into_inner);
        history.push_back(latency);
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }

    /// Snapshot of the latency history in arrival order.
    pub fn latency_history(&self) -> Vec<Duration> {
        let history = self.latencies.lock().unwrap_or_else(PoisonError::into_inner);
        history.iter().copied().collect()
    }

    /// Mean of the history, `None` while no sample exists.
    pub fn average_latency(&self) -> Option<Duration> {
        let history = self.latencies.lock().unwrap_or_else(PoisonError::into_inner);
        if history.is_empty() {
            return None;
        }
        let total: Duration = history.iter().sum();
        Some(total / history.len() as u32)
    }

    /// Average latency in milliseconds, `+inf` while cold.
    pub(crate) fn average_ms(&self) -> f64 {
        self.average_latency()
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(f64::INFINITY)
    }
}
