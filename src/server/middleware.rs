//! Middleware chain execution.
//!
//! # State Machine
//! ```text
//! Running(i) ── ctx.reply(..) called ──────────→ Responded (stop)
//!            ── Ok(Flow::Respond{..}) ─────────→ Returned  (stop)
//!            ── Err(..) / panic ──────────────→ Faulted   (stop, 500)
//!            ── Ok(Flow::Continue) ───────────→ Running(i+1) | Exhausted
//! ```
//!
//! # Design Decisions
//! - Every invocation gets its own [`MiddlewareContext`] with a fresh reply
//!   slot; writes after the invocation finished are never observed
//! - The first `reply` wins, later ones are ignored
//! - Callbacks run strictly one after another for a request

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use serde_json::Value;

use crate::codec::{ClientRecord, Credentials};
use crate::extensions::Properties;
use crate::server::error::HandlerError;

/// Status used when a reply does not name one.
pub const DEFAULT_REPLY_CODE: u16 = 200;

/// What a callback wants after it ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    /// Hand the request to the next callback.
    Continue,
    /// Finish the request with this payload.
    Respond { payload: Value, code: u16 },
}

impl Flow {
    pub fn respond(payload: Value) -> Self {
        Flow::Respond {
            payload,
            code: DEFAULT_REPLY_CODE,
        }
    }

    pub fn respond_with(payload: Value, code: u16) -> Self {
        Flow::Respond { payload, code }
    }
}

pub type MiddlewareResult = Result<Flow, HandlerError>;

pub type BoxFuture = Pin<Box<dyn Future<Output = MiddlewareResult> + Send>>;

/// One step of a trigger's chain.
///
/// Implemented for every `Fn(MiddlewareContext) -> impl Future<Output = MiddlewareResult>`.
pub trait Middleware: Send + Sync {
    fn call(&self, ctx: MiddlewareContext) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    fn call(&self, ctx: MiddlewareContext) -> BoxFuture {
        Box::pin(self(ctx))
    }
}

pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Box an async closure for use in a chain.
pub fn from_fn<F, Fut>(f: F) -> BoxedMiddleware
where
    F: Fn(MiddlewareContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MiddlewareResult> + Send + 'static,
{
    Arc::new(f)
}

type ReplySlot = Arc<Mutex<Option<(Value, u16)>>>;

/// Everything a callback sees about the request it is serving.
#[derive(Debug, Clone)]
pub struct MiddlewareContext {
    pub trigger: String,
    pub credentials: Credentials,
    /// Envelope payload.
    pub body: Value,
    /// Matched allow-list record (the caller's own credentials in open mode).
    pub client: ClientRecord,
    /// Server-wide capabilities contributed by extensions.
    pub properties: Properties,
    reply: ReplySlot,
}

impl MiddlewareContext {
    pub fn new(
        trigger: impl Into<String>,
        credentials: Credentials,
        body: Value,
        client: ClientRecord,
        properties: Properties,
    ) -> Self {
        Self {
            trigger: trigger.into(),
            credentials,
            body,
            client,
            properties,
            reply: ReplySlot::default(),
        }
    }

    /// Finish the request with `payload` at status 200.
    ///
    /// Returns `false` if a reply was already recorded.
    pub fn reply(&self, payload: Value) -> bool {
        self.reply_with(payload, DEFAULT_REPLY_CODE)
    }

    pub fn reply_with(&self, payload: Value, code: u16) -> bool {
        let mut slot = self.reply.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some((payload, code));
        true
    }

    pub fn has_replied(&self) -> bool {
        self.reply
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Same request data, new empty reply slot.
    fn fork(&self) -> Self {
        Self {
            reply: ReplySlot::default(),
            ..self.clone()
        }
    }

    fn take_reply(&self) -> Option<(Value, u16)> {
        self.reply.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// How a chain run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainOutcome {
    /// A callback called `ctx.reply`.
    Responded { payload: Value, code: u16 },
    /// A callback returned `Flow::Respond`.
    Returned { payload: Value, code: u16 },
    /// A callback failed or panicked.
    Faulted(HandlerError),
    /// Every callback continued.
    Exhausted,
}

impl ChainOutcome {
    /// Payload and status to send, or the fault.
    pub fn into_reply(self) -> Result<(Value, u16), HandlerError> {
        match self {
            ChainOutcome::Responded { payload, code } | ChainOutcome::Returned { payload, code } => {
                Ok((payload, code))
            }
            ChainOutcome::Faulted(err) => Err(err),
            ChainOutcome::Exhausted => Ok((Value::Null, DEFAULT_REPLY_CODE)),
        }
    }
}

/// Run `chain` in order until one callback finishes the request.
pub async fn run_chain(chain: &[BoxedMiddleware], seed: &MiddlewareContext) -> ChainOutcome {
    for (index, middleware) in chain.iter().enumerate() {
        let ctx = seed.fork();
        let observer = ctx.clone();

        let result = match catch_unwind(AssertUnwindSafe(|| middleware.call(ctx))) {
            Ok(fut) => AssertUnwindSafe(fut)
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(HandlerError::from_panic(panic))),
            Err(panic) => Err(HandlerError::from_panic(panic)),
        };

        if let Some((payload, code)) = observer.take_reply() {
            tracing::trace!(trigger = %seed.trigger, index, "Middleware replied");
            return ChainOutcome::Responded { payload, code };
        }

        match result {
            Ok(Flow::Continue) => continue,
            Ok(Flow::Respond { payload, code }) => {
                tracing::trace!(trigger = %seed.trigger, index, "Middleware returned");
                return ChainOutcome::Returned { payload, code };
            }
            Err(err) => {
                tracing::debug!(trigger = %seed.trigger, index, error = %err, "Middleware failed");
                return ChainOutcome::Faulted(err);
            }
        }
    }
    ChainOutcome::Exhausted
}
