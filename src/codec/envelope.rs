//! Wire-visible data model.
//!
//! Every call travels as an [`Envelope`]; every reply as a [`ResponseBody`].
//! Field names follow the wire format (`secretKey`, `type`), not Rust naming.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Language tag this crate attaches to outgoing credentials.
pub const PLATFORM: &str = "rust";

/// Fallback address when the local IP cannot be determined.
pub const LOCALHOST: &str = "127.0.0.1";

/// Wildcard accepted by [`ClientRecord`] `ip` and `language` fields.
pub const WILDCARD: &str = "*";

/// How the server should deliver the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeKind {
    /// Single compressed blob.
    #[default]
    Rpc,
    /// Incrementally written JSON tokens.
    Stream,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Rpc => "rpc",
            EnvelopeKind::Stream => "stream",
        }
    }
}

/// Caller identity attached to every envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

/// Server-side allow-list entry, keyed by `secret_key`.
///
/// Shares its shape with [`Credentials`]; `ip` and `language` may be `"*"`.
pub type ClientRecord = Credentials;

/// The unit of wire transmission. Built fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub uuid: String,
    pub trigger: String,
    #[serde(rename = "type", default)]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Envelope {
    /// Create an envelope with a fresh v4 uuid.
    pub fn new(
        trigger: impl Into<String>,
        kind: EnvelopeKind,
        payload: Value,
        credentials: Credentials,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            trigger: trigger.into(),
            kind,
            payload,
            credentials,
        }
    }
}

/// Outer HTTP request body: `{"message": "<base64 of gzip(JSON(envelope))>"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub message: String,
}

/// Error payload carried in `{"error": {"message": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

/// Decoded reply: either `{data}` or `{error: {message}}`.
///
/// `data: null` on the wire decodes to `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResponseBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ResponseBody {
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(ErrorBody {
                message: message.into(),
            }),
        }
    }
}
