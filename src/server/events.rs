//! Events delivered to server extensions.

use std::time::Duration;

use crate::codec::EnvelopeKind;
use crate::extensions::{HookEvent, HookKind};

#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Listener bound; fired once before the start callback.
    Start { url: String },
    /// Caller authenticated, handler lookup next.
    RequestBegin {
        uuid: String,
        trigger: String,
        kind: EnvelopeKind,
        ip: String,
        language: String,
    },
    RequestEnd {
        uuid: String,
        trigger: String,
        status: u16,
        /// Serialized payload size in bytes, before compression.
        size: usize,
        elapsed: Duration,
    },
    /// Request rejected or handler failed. `uuid` and `trigger` are absent
    /// when the envelope could not be decoded.
    Error {
        uuid: Option<String>,
        trigger: Option<String>,
        status: u16,
        message: String,
    },
}

impl HookEvent for ServerEvent {
    fn kind(&self) -> HookKind {
        match self {
            ServerEvent::Start { .. } => HookKind::Start,
            ServerEvent::RequestBegin { .. } => HookKind::RequestBegin,
            ServerEvent::RequestEnd { .. } => HookKind::RequestEnd,
            ServerEvent::Error { .. } => HookKind::Error,
        }
    }
}
