//! Cromio: a small RPC framework.
//!
//! A [`Client`] sends named trigger calls to a fixed pool of servers picked
//! by a load-balancing strategy; a [`Server`] authenticates each call, runs
//! the trigger's middleware chain and answers with gzip-compressed JSON,
//! either as one blob or as an incrementally decodable stream.
//!
//! # Layout
//! ```text
//! codec          envelope model, gzip/base64 wire format, streaming codec
//! extensions     hook registry + shared properties (both sides)
//! load_balancer  endpoint stats and selection strategies (client)
//! client         dispatch, retries, streaming consumption
//! server         auth, trigger registry, middleware chain, HTTP pipeline
//! config         serde schema, TOML loading, validation
//! resilience     retry classification and backoff
//! net            bind address helpers, TLS
//! lifecycle      shutdown coordination, signals
//! observability  tracing setup, metrics
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod extensions;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod server;

pub use client::{Client, ClientError, ClientEvent, RequestInfo, Response, StreamChunk};
pub use codec::{ClientRecord, Credentials, Envelope, EnvelopeKind};
pub use config::{ClientConfig, EndpointConfig, LoadBalancerStrategy, ServerConfig};
pub use extensions::{Extension, HookKind, Properties};
pub use lifecycle::Shutdown;
pub use server::{
    from_fn, Flow, HandlerError, MiddlewareContext, Server, ServerEvent, ServerHandle,
    TriggerDefinition,
};
