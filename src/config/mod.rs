//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ClientConfig / ServerConfig (validated, immutable)
//!     → handed to Client::new / Server::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_client_config, load_server_config, ConfigError};
pub use schema::{
    ClientConfig, ClientTlsConfig, EndpointConfig, LoadBalancerStrategy, RetryConfig,
    ServerConfig, ServerTlsConfig,
};
pub use validation::ValidationError;
