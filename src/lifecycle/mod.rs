//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Server::start (server/mod.rs):
//!     Bind listener → Load TLS → Spawn serve task → onStart → callback(url)
//!
//! Shutdown (shutdown.rs):
//!     ServerHandle::shutdown → broadcast → stop accepting → drain in-flight → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Listeners are bound before the start hook fires, so the URL handed to
//!   callers is already reachable
//! - Shutdown drains in-flight requests instead of dropping them

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::{shutdown_on_signal, wait_for_signal};
