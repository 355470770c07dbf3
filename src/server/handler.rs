//! HTTP request pipeline.
//!
//! # Data Flow
//! ```text
//! POST / {"message": ...}
//!     → codec::decode_request                  (400 on failure)
//!     → ClientTable::authenticate              (401 / 403)
//!     → onRequestBegin
//!     → TriggerRegistry::chain                 (404 if unknown)
//!     → run_chain under request_timeout_secs   (500 on fault, 504 on expiry)
//!     → onRequestEnd
//!     → gzip {data} blob | streamed gzip tokens
//!
//! any other method or path → 405
//! ```
//!
//! # Design Decisions
//! - Every failure is answered with a gzip `{"error":{"message"}}` body and
//!   fires `onError`; nothing escapes the request
//! - `logs` only gates the per-request info lines

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::codec::{self, Envelope, EnvelopeKind, ResponseBody, StreamEncoder};
use crate::config::ServerConfig;
use crate::extensions::ExtensionRegistry;
use crate::observability::metrics;
use crate::server::auth::ClientTable;
use crate::server::error::RequestError;
use crate::server::events::ServerEvent;
use crate::server::middleware::{run_chain, MiddlewareContext};
use crate::server::trigger::TriggerRegistry;

/// Shared, read-only state of a running server.
pub(crate) struct AppState {
    pub(crate) registry: TriggerRegistry,
    pub(crate) clients: ClientTable,
    pub(crate) extensions: ExtensionRegistry<ServerEvent>,
    pub(crate) logs: bool,
    /// Deadline for one trigger's middleware chain.
    pub(crate) request_timeout: Duration,
}

pub(crate) fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", post(rpc_handler).fallback(method_not_allowed))
        .fallback(method_not_allowed)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}

async fn method_not_allowed(State(state): State<Arc<AppState>>) -> Response {
    state.reject(None, RequestError::MethodNotAllowed, Instant::now())
}

async fn rpc_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let started = Instant::now();

    let envelope = match codec::decode_request(&body) {
        Ok(envelope) => envelope,
        Err(e) => return state.reject(None, e.into(), started),
    };

    let client = match state.clients.authenticate(&envelope.credentials) {
        Ok(client) => client,
        Err(e) => return state.reject(Some(&envelope), e, started),
    };

    tracing::debug!(
        uuid = %envelope.uuid,
        trigger = %envelope.trigger,
        kind = envelope.kind.as_str(),
        ip = %envelope.credentials.ip,
        "Request authenticated"
    );
    state.extensions.fire(&ServerEvent::RequestBegin {
        uuid: envelope.uuid.clone(),
        trigger: envelope.trigger.clone(),
        kind: envelope.kind,
        ip: envelope.credentials.ip.clone(),
        language: envelope.credentials.language.clone(),
    });

    let Some(chain) = state.registry.chain(&envelope.trigger) else {
        let err = RequestError::TriggerNotFound(envelope.trigger.clone());
        return state.reject(Some(&envelope), err, started);
    };

    let seed = MiddlewareContext::new(
        envelope.trigger.clone(),
        envelope.credentials.clone(),
        envelope.payload.clone(),
        client,
        state.extensions.properties().clone(),
    );
    let outcome = match tokio::time::timeout(state.request_timeout, run_chain(&chain, &seed)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let err = RequestError::Timeout {
                trigger: envelope.trigger.clone(),
                after: state.request_timeout,
            };
            return state.reject(Some(&envelope), err, started);
        }
    };
    let (payload, code) = match outcome.into_reply() {
        Ok(reply) => reply,
        Err(fault) => return state.reject(Some(&envelope), fault.into(), started),
    };

    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::OK);
    let size = serde_json::to_vec(&payload).map(|v| v.len()).unwrap_or(0);
    let elapsed = started.elapsed();

    if state.logs {
        tracing::info!(
            uuid = %envelope.uuid,
            trigger = %envelope.trigger,
            status = status.as_u16(),
            size,
            elapsed = ?elapsed,
            "Request handled"
        );
    }
    metrics::record_server_request(&envelope.trigger, status.as_u16(), elapsed);
    state.extensions.fire(&ServerEvent::RequestEnd {
        uuid: envelope.uuid.clone(),
        trigger: envelope.trigger.clone(),
        status: status.as_u16(),
        size,
        elapsed,
    });

    match envelope.kind {
        EnvelopeKind::Rpc => gzip_reply(status, &ResponseBody::data(payload)),
        EnvelopeKind::Stream => stream_reply(status, payload),
    }
}

impl AppState {
    /// Answer with a structured error and fire `onError`.
    fn reject(&self, envelope: Option<&Envelope>, error: RequestError, started: Instant) -> Response {
        let status = error.status();
        let message = error.to_string();
        let trigger = envelope.map(|e| e.trigger.clone());

        if self.logs {
            tracing::info!(
                uuid = envelope.map(|e| e.uuid.as_str()),
                trigger = trigger.as_deref(),
                status = status.as_u16(),
                kind = error.kind(),
                error = %message,
                "Request rejected"
            );
        }
        metrics::record_server_request(trigger.as_deref().unwrap_or("-"), status.as_u16(), started.elapsed());
        self.extensions.fire(&ServerEvent::Error {
            uuid: envelope.map(|e| e.uuid.clone()),
            trigger,
            status: status.as_u16(),
            message: message.clone(),
        });

        gzip_reply(status, &ResponseBody::error(message))
    }
}

fn gzip_reply(status: StatusCode, body: &ResponseBody) -> Response {
    match codec::encode(body) {
        Ok(bytes) => (
            status,
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_ENCODING, "gzip"),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode reply");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn stream_reply(status: StatusCode, payload: Value) -> Response {
    let chunks = futures_util::stream::iter(StreamEncoder::new(payload));
    (
        status,
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_ENCODING, "gzip"),
        ],
        Body::from_stream(chunks),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_request, Credentials, StreamDecoder};
    use crate::server::middleware::{from_fn, Flow};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn app(clients: Vec<crate::codec::ClientRecord>) -> Router {
        app_with_timeout(clients, Duration::from_secs(30))
    }

    fn app_with_timeout(clients: Vec<crate::codec::ClientRecord>, request_timeout: Duration) -> Router {
        let mut registry = TriggerRegistry::new();
        registry.register(
            "div",
            vec![from_fn(|ctx: MiddlewareContext| async move {
                let a = ctx.body["num1"].as_f64().unwrap_or(0.0);
                let b = ctx.body["num2"].as_f64().unwrap_or(1.0);
                if b == 0.0 {
                    return Err("division by zero".into());
                }
                Ok(Flow::respond(json!(a / b)))
            })],
        );
        registry.register(
            "list",
            vec![from_fn(|_ctx: MiddlewareContext| async move {
                Ok(Flow::respond(json!([1, 2, 3])))
            })],
        );
        registry.register(
            "slow",
            vec![from_fn(|_ctx: MiddlewareContext| async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(Flow::respond(json!("late")))
            })],
        );
        let state = Arc::new(AppState {
            registry,
            clients: ClientTable::new(clients),
            extensions: ExtensionRegistry::new(),
            logs: false,
            request_timeout,
        });
        build_router(state, &ServerConfig::default())
    }

    fn rpc(trigger: &str, kind: EnvelopeKind, payload: Value) -> Request<Body> {
        let envelope = Envelope::new(trigger, kind, payload, Credentials::default());
        let body = serde_json::to_vec(&encode_request(&envelope).unwrap()).unwrap();
        Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    async fn decode_body(response: Response) -> ResponseBody {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        codec::decode(&bytes).unwrap()
    }

    #[tokio::test]
    async fn unary_reply_is_gzip_data() {
        let response = app(vec![])
            .oneshot(rpc("div", EnvelopeKind::Rpc, json!({"num1": 10, "num2": 2})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_ENCODING], "gzip");
        assert_eq!(decode_body(response).await, ResponseBody::data(json!(5.0)));
    }

    #[tokio::test]
    async fn handler_fault_is_500() {
        let response = app(vec![])
            .oneshot(rpc("div", EnvelopeKind::Rpc, json!({"num1": 1, "num2": 0})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(decode_body(response).await, ResponseBody::error("division by zero"));
    }

    #[tokio::test]
    async fn unknown_trigger_is_404() {
        let response = app(vec![])
            .oneshot(rpc("nope", EnvelopeKind::Rpc, Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            decode_body(response).await,
            ResponseBody::error("Trigger 'nope' is not registered on the server")
        );
    }

    #[tokio::test]
    async fn slow_chain_is_a_structured_504() {
        let response = app_with_timeout(vec![], Duration::from_millis(50))
            .oneshot(rpc("slow", EnvelopeKind::Rpc, Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            decode_body(response).await,
            ResponseBody::error("Trigger 'slow' did not finish within 50ms")
        );
    }

    #[tokio::test]
    async fn non_post_is_405() {
        let response = app(vec![])
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            decode_body(response).await,
            ResponseBody::error("Only POST requests are allowed.")
        );

        let response = app(vec![])
            .oneshot(Request::post("/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn garbage_body_is_400() {
        let response = app(vec![])
            .oneshot(Request::post("/").body(Body::from("{\"message\":\"%%%\"}")).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_key_is_401() {
        let record = crate::codec::ClientRecord {
            secret_key: "k1".into(),
            ip: "*".into(),
            language: "*".into(),
            roles: None,
        };
        let response = app(vec![record])
            .oneshot(rpc("div", EnvelopeKind::Rpc, json!({"num1": 1, "num2": 1})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stream_reply_decodes_incrementally() {
        let response = app(vec![])
            .oneshot(rpc("list", EnvelopeKind::Stream, Value::Null))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let mut decoder = StreamDecoder::new();
        let mut items = decoder.push(&bytes).unwrap();
        items.extend(decoder.finish().unwrap());
        assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
    }
}
