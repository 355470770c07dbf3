//! Server-side error types.

use std::any::Any;
use std::time::Duration;

use axum::http::StatusCode;
use serde_json::Value;

use crate::codec::SerializationError;
use crate::config::ConfigError;
use crate::net::TlsError;

/// A middleware or handler fault, normalized to one message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Strings are kept verbatim, `null` becomes "Unknown error", anything
    /// else is rendered as compact JSON.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::String(s) => Self::new(s.clone()),
            Value::Null => Self::new("Unknown error"),
            Value::Object(map) => match map.get("message") {
                Some(Value::String(message)) => Self::new(message.clone()),
                _ => Self::new(value.to_string()),
            },
            other => Self::new(other.to_string()),
        }
    }

    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(err.to_string())
    }

    /// Message of a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(s) = payload.downcast_ref::<&str>() {
            Self::new(*s)
        } else if let Some(s) = payload.downcast_ref::<String>() {
            Self::new(s.clone())
        } else {
            Self::new("Unknown error")
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<Value> for HandlerError {
    fn from(value: Value) -> Self {
        Self::from_value(&value)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::from_error(err)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(err)
    }
}

/// Why an inbound request was not served by a handler.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("Malformed request: {0}")]
    Serialization(#[from] SerializationError),
    #[error("{0}")]
    Authentication(String),
    #[error("{0}")]
    Authorization(String),
    #[error("Trigger '{0}' is not registered on the server")]
    TriggerNotFound(String),
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error("Only POST requests are allowed.")]
    MethodNotAllowed,
    #[error("Trigger '{trigger}' did not finish within {}ms", .after.as_millis())]
    Timeout { trigger: String, after: Duration },
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Serialization(_) => StatusCode::BAD_REQUEST,
            RequestError::Authentication(_) => StatusCode::UNAUTHORIZED,
            RequestError::Authorization(_) => StatusCode::FORBIDDEN,
            RequestError::TriggerNotFound(_) => StatusCode::NOT_FOUND,
            RequestError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RequestError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Serialization(_) => "serialization",
            RequestError::Authentication(_) => "authentication",
            RequestError::Authorization(_) => "authorization",
            RequestError::TriggerNotFound(_) => "trigger_not_found",
            RequestError::Handler(_) => "handler",
            RequestError::MethodNotAllowed => "method_not_allowed",
            RequestError::Timeout { .. } => "timeout",
        }
    }
}

/// Failure to start serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("invalid server configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] TlsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn values_normalize_to_a_message() {
        assert_eq!(HandlerError::from(json!("boom")).message(), "boom");
        assert_eq!(HandlerError::from(Value::Null).message(), "Unknown error");
        assert_eq!(HandlerError::from(json!({"message": "bad input"})).message(), "bad input");
        assert_eq!(HandlerError::from(json!({"code": 7})).message(), r#"{"code":7}"#);
        assert_eq!(HandlerError::from(json!(42)).message(), "42");
    }

    #[test]
    fn panics_normalize_to_a_message() {
        let caught = std::panic::catch_unwind(|| panic!("division by zero")).unwrap_err();
        assert_eq!(HandlerError::from_panic(caught).message(), "division by zero");

        let caught = std::panic::catch_unwind(|| panic!("{} items", 3)).unwrap_err();
        assert_eq!(HandlerError::from_panic(caught).message(), "3 items");

        let caught = std::panic::catch_unwind(|| std::panic::panic_any(17u8)).unwrap_err();
        assert_eq!(HandlerError::from_panic(caught).message(), "Unknown error");
    }

    #[test]
    fn status_mapping() {
        assert_eq!(RequestError::Authentication("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(RequestError::Authorization("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(RequestError::TriggerNotFound("div".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(RequestError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            RequestError::Handler(HandlerError::new("x")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            RequestError::TriggerNotFound("div".into()).to_string(),
            "Trigger 'div' is not registered on the server"
        );

        let timeout = RequestError::Timeout {
            trigger: "slow".into(),
            after: Duration::from_secs(2),
        };
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.to_string(), "Trigger 'slow' did not finish within 2000ms");
    }
}
