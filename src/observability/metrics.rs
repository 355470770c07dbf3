//! Metrics collection.
//!
//! # Metrics
//! - `cromio_server_requests_total` (counter): requests by trigger, status
//! - `cromio_server_request_duration_seconds` (histogram): handling time by trigger
//! - `cromio_client_requests_total` (counter): calls by endpoint, outcome
//! - `cromio_client_retries_total` (counter): retried attempts by endpoint
//!
//! # Design Decisions
//! - Low-overhead metric updates through the `metrics` facade
//! - Without an installed recorder every call is a no-op

use std::time::Duration;

pub fn record_server_request(trigger: &str, status: u16, elapsed: Duration) {
    metrics::counter!(
        "cromio_server_requests_total",
        "trigger" => trigger.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "cromio_server_request_duration_seconds",
        "trigger" => trigger.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_client_request(endpoint: &str, outcome: &'static str) {
    metrics::counter!(
        "cromio_client_requests_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_client_retry(endpoint: &str) {
    metrics::counter!("cromio_client_retries_total", "endpoint" => endpoint.to_string()).increment(1);
}
