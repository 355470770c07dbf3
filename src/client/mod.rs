//! RPC client.
//!
//! # Data Flow
//! ```text
//! dispatch(trigger, payload)
//!     → ServerPool::pick (load balancer snapshot)
//!     → Envelope (endpoint secret key + language/ip/roles)
//!     → onRequestBegin
//!     → codec::encode_request
//!     → transport::exchange under a per-attempt deadline
//!         ↺ retryable failure: onRequestRetry, backoff, same endpoint
//!     → codec::decode reply
//!     → ServerPool::record_completion (latency + request count)
//!     → onRequestEnd | onError
//!     → Response { data, error, info }
//! ```
//!
//! # Design Decisions
//! - `dispatch*` never returns `Err`; failures travel inside [`Response`]
//! - Selection and completion update are separate steps, so concurrent
//!   calls may pick the same endpoint
//! - Any decodable reply envelope is an application answer and is never
//!   retried, whatever its status code

pub mod error;
pub mod events;
pub mod stream;
pub mod transport;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

pub use error::{ClientError, TransportError};
pub use events::ClientEvent;
pub use stream::StreamChunk;

use crate::codec::{self, Credentials, Envelope, EnvelopeKind, ResponseBody};
use crate::config::validation::validate_client_config;
use crate::config::{ClientConfig, LoadBalancerStrategy, RetryConfig};
use crate::extensions::{Extension, ExtensionRegistry, Properties};
use crate::load_balancer::endpoint::Endpoint;
use crate::load_balancer::pool::ServerPool;
use crate::net::detect_local_ip;
use crate::observability::metrics;
use crate::resilience::RetryPolicy;

/// Metadata attached to a [`Response`] when `show_request_info` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub strategy: LoadBalancerStrategy,
    pub endpoint: String,
    /// Completed calls on the chosen endpoint, including this one on success.
    pub requests: usize,
    /// Compressed response bytes received.
    pub size: usize,
    pub elapsed: Duration,
}

/// Outcome of a call. `data` is `Null` whenever `error` is set.
#[derive(Debug, Clone)]
pub struct Response {
    pub data: Value,
    pub error: Option<ClientError>,
    pub info: Option<RequestInfo>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Value, ClientError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.data),
        }
    }
}

/// Per-call state shared by the unary and streaming paths.
pub(crate) struct Call {
    pub(crate) uuid: String,
    pub(crate) trigger: String,
    pub(crate) endpoint: Arc<Endpoint>,
    pub(crate) index: usize,
    pub(crate) started: Instant,
}

impl Call {
    fn endpoint_label(&self) -> String {
        self.endpoint.url.to_string()
    }
}

/// Load-balanced RPC client over a fixed pool of servers.
pub struct Client {
    pool: ServerPool,
    transports: Vec<reqwest::Client>,
    extensions: ExtensionRegistry<ClientEvent>,
    timeout: Duration,
    retry: RetryConfig,
    show_request_info: bool,
    language: String,
    ip: String,
    roles: Option<Vec<String>>,
}

impl Client {
    /// Build a client. Fails on an empty or invalid endpoint list.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        validate_client_config(&config).map_err(|errors| {
            ClientError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let pool = ServerPool::new(&config.endpoints, config.load_balancer, config.epsilon)
            .map_err(|e| ClientError::Config(e.to_string()))?;
        let transports = pool
            .endpoints()
            .iter()
            .map(|endpoint| transport::build_http_client(endpoint.tls.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        let ip = config.ip.clone().unwrap_or_else(detect_local_ip);
        tracing::debug!(
            endpoints = pool.len(),
            strategy = %pool.strategy(),
            ip = %ip,
            "Client created"
        );

        Ok(Self {
            pool,
            transports,
            extensions: ExtensionRegistry::new(),
            timeout: Duration::from_millis(config.timeout_ms),
            retry: config.retry,
            show_request_info: config.show_request_info,
            language: config.language,
            ip,
            roles: config.roles,
        })
    }

    /// Register an extension and merge its injected properties.
    pub fn add_extension(&mut self, extension: Extension<ClientEvent>) {
        self.extensions.register(extension);
    }

    pub fn add_extensions<I>(&mut self, extensions: I)
    where
        I: IntoIterator<Item = Extension<ClientEvent>>,
    {
        for extension in extensions {
            self.add_extension(extension);
        }
    }

    /// Capabilities contributed by extensions.
    pub fn properties(&self) -> &Properties {
        self.extensions.properties()
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        self.pool.endpoints()
    }

    pub fn strategy(&self) -> LoadBalancerStrategy {
        self.pool.strategy()
    }

    /// Call `trigger` and wait for the whole reply.
    pub async fn dispatch(&self, trigger: &str, payload: Value) -> Response {
        let (call, envelope) = self.begin(trigger, EnvelopeKind::Rpc, payload);
        let message = match codec::encode_request(&envelope) {
            Ok(message) => message,
            Err(e) => return self.fail(&call, e.into()),
        };

        let http = &self.transports[call.index];
        let url = &call.endpoint.url;
        let timeout = self.timeout;
        let message = &message;

        let result = self
            .with_retries(&call, move || async move {
                let (status, body) = transport::exchange(http, url, message, timeout).await?;
                let data = interpret(status, &body)?;
                Ok::<_, ClientError>((status, body.len(), data))
            })
            .await;

        match result {
            Ok((status, size, data)) => self.succeed(&call, status, size, data),
            Err(e) => self.fail(&call, e),
        }
    }

    /// Pick an endpoint, build the envelope and fire `RequestBegin`.
    pub(crate) fn begin(&self, trigger: &str, kind: EnvelopeKind, payload: Value) -> (Call, Envelope) {
        let (endpoint, index) = self.pool.pick(&mut rand::thread_rng());
        let credentials = Credentials {
            secret_key: endpoint.secret_key.clone().unwrap_or_default(),
            ip: self.ip.clone(),
            language: self.language.clone(),
            roles: self.roles.clone(),
        };
        let envelope = Envelope::new(trigger, kind, payload, credentials);
        let call = Call {
            uuid: envelope.uuid.clone(),
            trigger: envelope.trigger.clone(),
            endpoint,
            index,
            started: Instant::now(),
        };

        tracing::debug!(
            uuid = %call.uuid,
            trigger = %call.trigger,
            kind = kind.as_str(),
            endpoint = %call.endpoint.url,
            "Dispatching"
        );
        self.extensions.fire(&ClientEvent::RequestBegin {
            uuid: call.uuid.clone(),
            trigger: call.trigger.clone(),
            kind,
            endpoint: call.endpoint_label(),
            strategy: self.pool.strategy(),
        });
        (call, envelope)
    }

    /// Run `attempt` until it succeeds, fails for good, or the budget is spent.
    pub(crate) async fn with_retries<T, F, Fut>(&self, call: &Call, mut attempt: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut policy = RetryPolicy::new(&self.retry);
        loop {
            let number = policy.begin_attempt();
            let error = match attempt().await {
                Ok(value) => return Ok(value),
                Err(ClientError::Transport(e)) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if !policy.can_retry() {
                return Err(if number > 1 {
                    ClientError::RetryExhausted {
                        attempts: number,
                        source: error,
                    }
                } else {
                    ClientError::Transport(error)
                });
            }

            let delay = policy.next_delay();
            tracing::warn!(
                uuid = %call.uuid,
                attempt = number,
                delay = ?delay,
                error = %error,
                "Retrying request"
            );
            metrics::record_client_retry(call.endpoint.url.as_str());
            self.extensions.fire(&ClientEvent::RequestRetry {
                uuid: call.uuid.clone(),
                trigger: call.trigger.clone(),
                endpoint: call.endpoint_label(),
                attempt: number,
                delay,
                reason: error.to_string(),
            });
            tokio::time::sleep(delay).await;
        }
    }

    /// Record a completed call and fire `RequestEnd`.
    pub(crate) fn complete(&self, call: &Call, status: u16, size: usize) -> Option<RequestInfo> {
        let elapsed = call.started.elapsed();
        let requests = self.pool.record_completion(call.index, elapsed);

        tracing::debug!(
            uuid = %call.uuid,
            trigger = %call.trigger,
            status,
            size,
            elapsed = ?elapsed,
            "Request completed"
        );
        metrics::record_client_request(call.endpoint.url.as_str(), "success");
        self.extensions.fire(&ClientEvent::RequestEnd {
            uuid: call.uuid.clone(),
            trigger: call.trigger.clone(),
            endpoint: call.endpoint_label(),
            strategy: self.pool.strategy(),
            status,
            size,
            elapsed,
        });

        self.show_request_info.then(|| RequestInfo {
            strategy: self.pool.strategy(),
            endpoint: call.endpoint_label(),
            requests,
            size,
            elapsed,
        })
    }

    /// Fire `Error` for a terminal failure.
    pub(crate) fn report_error(&self, call: &Call, error: &ClientError) -> Option<RequestInfo> {
        tracing::warn!(
            uuid = %call.uuid,
            trigger = %call.trigger,
            endpoint = %call.endpoint.url,
            error = %error,
            "Request failed"
        );
        metrics::record_client_request(call.endpoint.url.as_str(), error.outcome());
        self.extensions.fire(&ClientEvent::Error {
            uuid: call.uuid.clone(),
            trigger: call.trigger.clone(),
            endpoint: call.endpoint_label(),
            error: error.clone(),
        });

        self.show_request_info.then(|| RequestInfo {
            strategy: self.pool.strategy(),
            endpoint: call.endpoint_label(),
            requests: call.endpoint.active_requests(),
            size: 0,
            elapsed: call.started.elapsed(),
        })
    }

    fn succeed(&self, call: &Call, status: u16, size: usize, data: Value) -> Response {
        let info = self.complete(call, status, size);
        Response {
            data,
            error: None,
            info,
        }
    }

    fn fail(&self, call: &Call, error: ClientError) -> Response {
        let info = self.report_error(call, &error);
        Response {
            data: Value::Null,
            error: Some(error),
            info,
        }
    }
}

/// Decode a unary reply body.
///
/// A body that decodes as a reply envelope is the application's answer and
/// is final whatever the status. Only an undecodable non-2xx body becomes a
/// transport status, which may be retried.
pub(crate) fn interpret(status: u16, body: &[u8]) -> Result<Value, ClientError> {
    let reply = match codec::decode::<ResponseBody>(body) {
        Ok(reply) => reply,
        Err(_) if !(200..300).contains(&status) => return Err(TransportError::Status(status).into()),
        Err(e) => return Err(e.into()),
    };
    match reply {
        ResponseBody {
            error: Some(err), ..
        } => Err(ClientError::Remote {
            status,
            message: err.message,
        }),
        ResponseBody { data, .. } => Ok(data.unwrap_or(Value::Null)),
    }
}
