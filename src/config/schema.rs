//! Configuration schema definitions.
//!
//! This module defines the configuration for both sides of the framework.
//! All types derive Serde traits for deserialization from config files.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::codec::ClientRecord;

/// Endpoint selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum LoadBalancerStrategy {
    LeastConnection,
    #[default]
    BestBiased,
    LeastLatency,
    EpsilonGreedy,
}

impl LoadBalancerStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadBalancerStrategy::LeastConnection => "leastConnection",
            LoadBalancerStrategy::BestBiased => "bestBiased",
            LoadBalancerStrategy::LeastLatency => "leastLatency",
            LoadBalancerStrategy::EpsilonGreedy => "epsilonGreedy",
        }
    }
}

impl fmt::Display for LoadBalancerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root configuration for a client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upstream servers; index order is fixed for the client's lifetime.
    pub endpoints: Vec<EndpointConfig>,

    /// Endpoint selection strategy.
    pub load_balancer: LoadBalancerStrategy,

    /// Exploration probability for epsilon-greedy.
    pub epsilon: f64,

    /// Attach request info (strategy, endpoint, size, time) to responses.
    pub show_request_info: bool,

    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,

    /// Retry configuration.
    pub retry: RetryConfig,

    /// Language tag sent in credentials.
    pub language: String,

    /// Caller IP sent in credentials; detected when absent.
    pub ip: Option<String>,

    /// Optional roles forwarded in credentials.
    pub roles: Option<Vec<String>>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            load_balancer: LoadBalancerStrategy::default(),
            epsilon: 0.1,
            show_request_info: false,
            timeout_ms: 5_000,
            retry: RetryConfig::default(),
            language: crate::codec::envelope::PLATFORM.to_string(),
            ip: None,
            roles: None,
        }
    }
}

impl ClientConfig {
    /// Convenience constructor for plain-HTTP endpoints.
    pub fn with_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: addresses.into_iter().map(EndpointConfig::new).collect(),
            ..Self::default()
        }
    }
}

/// One upstream server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EndpointConfig {
    /// Server URL (e.g., "https://10.0.0.5:2000").
    pub address: String,

    /// Optional TLS material for this endpoint.
    #[serde(default)]
    pub tls: Option<ClientTlsConfig>,

    /// Secret key presented to this server.
    #[serde(default)]
    pub secret_key: Option<String>,
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls: None,
            secret_key: None,
        }
    }

    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }
}

/// Client-side TLS material (PEM files).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct ClientTlsConfig {
    /// Extra CA certificate to trust.
    pub ca_path: Option<PathBuf>,

    /// Client certificate for mutual TLS.
    pub cert_path: Option<PathBuf>,

    /// Client private key for mutual TLS.
    pub key_path: Option<PathBuf>,

    /// Skip certificate verification (development only).
    pub accept_invalid_certs: bool,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per call, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Root configuration for a server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Port to bind; 0 lets the OS pick one.
    pub port: u16,

    /// Optional TLS configuration; presence selects TLS transport.
    pub tls: Option<ServerTlsConfig>,

    /// Allow-list; empty means accept every caller.
    pub clients: Vec<ClientRecord>,

    /// Per-request info logs.
    pub logs: bool,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            tls: None,
            clients: Vec::new(),
            logs: true,
            request_timeout_secs: 30,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerTlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,

    /// CA bundle used to verify client certificates.
    #[serde(default)]
    pub ca_path: Option<PathBuf>,

    /// Reject clients that do not present a certificate signed by `ca_path`.
    #[serde(default)]
    pub require_client_cert: bool,
}
