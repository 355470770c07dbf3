//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Client attempt fails:
//!     → retries.rs (is the failure transient? attempts left?)
//!     → backoff.rs (how long to wait before the next attempt)
//!     → next attempt goes to the same endpoint
//! ```
//!
//! # Design Decisions
//! - Every attempt has its own deadline (see `ClientConfig::timeout_ms`)
//! - Only transport failures and gateway-style statuses are retried;
//!   structured application errors never are
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{is_retryable_status, RetryPolicy};
