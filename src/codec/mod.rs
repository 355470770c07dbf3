//! Envelope codec.
//!
//! # Data Flow
//! ```text
//! Request:
//!     Envelope → JSON → gzip → base64 → {"message": "..."}  (client)
//!     {"message": "..."} → base64 → gunzip → JSON → Envelope (server)
//!
//! Unary reply:
//!     ResponseBody → JSON → gzip  (Content-Encoding: gzip)
//!
//! Streamed reply (stream.rs):
//!     payload → JSON tokens → gzip with sync flush per token group
//!     → incremental gunzip → incremental JSON parse (client)
//! ```
//!
//! # Design Decisions
//! - Each stage has its own error variant so a corrupt blob is never
//!   mistaken for a bad JSON document
//! - Decoding never yields a partial value

pub mod envelope;
pub mod stream;

use std::io::{Read, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{de::DeserializeOwned, Serialize};

pub use envelope::{
    ClientRecord, Credentials, Envelope, EnvelopeKind, ErrorBody, ResponseBody, WireMessage,
};
pub use stream::{StreamDecoder, StreamEncoder};

/// Failure while encoding or decoding a wire value.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    #[error("malformed base64 message: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("corrupt compressed stream: {0}")]
    Compression(#[from] std::io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON-serialize then gzip.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let json = serde_json::to_vec(value)?;
    compress(&json)
}

/// Gunzip then JSON-deserialize.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    let json = decompress(bytes)?;
    Ok(serde_json::from_slice(&json)?)
}

/// Wrap an already encoded envelope into the HTTP request body.
pub fn wrap_message(encoded: &[u8]) -> WireMessage {
    WireMessage {
        message: STANDARD.encode(encoded),
    }
}

/// Build the full request body for an envelope.
pub fn encode_request(envelope: &Envelope) -> Result<WireMessage, SerializationError> {
    Ok(wrap_message(&encode(envelope)?))
}

/// Reverse of [`encode_request`], starting from the raw HTTP body bytes.
pub fn decode_request(body: &[u8]) -> Result<Envelope, SerializationError> {
    let wire: WireMessage = serde_json::from_slice(body)?;
    let compressed = STANDARD.decode(wire.message.as_bytes())?;
    decode(&compressed)
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>, SerializationError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 16), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>, SerializationError> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}
