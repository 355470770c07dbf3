//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Client and server produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, histograms via the `metrics` facade)
//!
//! Consumers:
//!     → whichever tracing subscriber / metrics recorder the host installs
//! ```
//!
//! # Design Decisions
//! - Structured fields, never pre-formatted strings
//! - Envelope uuid flows through every request log line
//! - No exporter is bundled; extensions or the host install one

pub mod logging;
pub mod metrics;

pub use logging::init_tracing;
