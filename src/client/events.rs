//! Events delivered to client extensions.

use std::time::Duration;

use crate::client::error::ClientError;
use crate::codec::EnvelopeKind;
use crate::config::LoadBalancerStrategy;
use crate::extensions::{HookEvent, HookKind};

/// One point in a client call's lifecycle.
///
/// Per call the order is `RequestBegin`, zero or more `RequestRetry`,
/// then exactly one of `RequestEnd` or `Error`.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    RequestBegin {
        uuid: String,
        trigger: String,
        kind: EnvelopeKind,
        endpoint: String,
        strategy: LoadBalancerStrategy,
    },
    RequestRetry {
        uuid: String,
        trigger: String,
        endpoint: String,
        /// Number of the attempt that just failed.
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    RequestEnd {
        uuid: String,
        trigger: String,
        endpoint: String,
        strategy: LoadBalancerStrategy,
        status: u16,
        /// Compressed response bytes received.
        size: usize,
        elapsed: Duration,
    },
    Error {
        uuid: String,
        trigger: String,
        endpoint: String,
        error: ClientError,
    },
}

impl HookEvent for ClientEvent {
    fn kind(&self) -> HookKind {
        match self {
            ClientEvent::RequestBegin { .. } => HookKind::RequestBegin,
            ClientEvent::RequestRetry { .. } => HookKind::RequestRetry,
            ClientEvent::RequestEnd { .. } => HookKind::RequestEnd,
            ClientEvent::Error { .. } => HookKind::Error,
        }
    }
}

impl ClientEvent {
    pub fn uuid(&self) -> &str {
        match self {
            ClientEvent::RequestBegin { uuid, .. }
            | ClientEvent::RequestRetry { uuid, .. }
            | ClientEvent::RequestEnd { uuid, .. }
            | ClientEvent::Error { uuid, .. } => uuid,
        }
    }

    pub fn trigger(&self) -> &str {
        match self {
            ClientEvent::RequestBegin { trigger, .. }
            | ClientEvent::RequestRetry { trigger, .. }
            | ClientEvent::RequestEnd { trigger, .. }
            | ClientEvent::Error { trigger, .. } => trigger,
        }
    }
}
