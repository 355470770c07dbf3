//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Server:
//!     ServerConfig.bind_address:port
//!     → addr.rs (bind, derive the externally reachable URL)
//!     → tls.rs (optional rustls config, optional client-cert verification)
//!     → hand off to the HTTP layer
//!
//! Client:
//!     addr.rs (detect the caller IP placed in credentials)
//! ```
//!
//! # Design Decisions
//! - TLS is optional and chosen by the presence of certificate material
//! - Port 0 is resolved by the OS; the bound address is always reported back

pub mod addr;
pub mod tls;

pub use addr::{detect_local_ip, public_url};
pub use tls::{load_server_tls, TlsError};
