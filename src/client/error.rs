//! Client-side error types.

use std::sync::Arc;
use std::time::Duration;

use crate::codec::SerializationError;
use crate::resilience::is_retryable_status;

/// Classified failure of a single HTTP exchange.
///
/// The display text is the friendly message; `source()` is the original error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("TLS trust failure: the server certificate was not accepted")]
    TlsTrust(#[source] Arc<reqwest::Error>),
    #[error("server unreachable: connection refused or host not found")]
    Unreachable(#[source] Arc<reqwest::Error>),
    #[error("request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("server responded with HTTP {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),
}

impl TransportError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::TlsTrust(_) => false,
            TransportError::Unreachable(_) | TransportError::Timeout(_) | TransportError::Network(_) => true,
            TransportError::Status(status) => is_retryable_status(*status),
        }
    }
}

/// Terminal failure of a client call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("serialization failed: {0}")]
    Serialization(Arc<SerializationError>),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{source} (gave up after {attempts} attempts)")]
    RetryExhausted {
        attempts: u32,
        source: TransportError,
    },
    /// Structured error returned by the server.
    #[error("{message}")]
    Remote { status: u16, message: String },
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<SerializationError> for ClientError {
    fn from(err: SerializationError) -> Self {
        ClientError::Serialization(Arc::new(err))
    }
}

impl ClientError {
    /// Short label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            ClientError::Serialization(_) => "serialization_error",
            ClientError::Transport(_) | ClientError::RetryExhausted { .. } => "transport_error",
            ClientError::Remote { .. } => "remote_error",
            ClientError::Config(_) => "config_error",
        }
    }

    /// HTTP status of the failed exchange, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Remote { status, .. } => Some(*status),
            ClientError::Transport(TransportError::Status(status))
            | ClientError::RetryExhausted {
                source: TransportError::Status(status),
                ..
            } => Some(*status),
            _ => None,
        }
    }
}
