//! Streaming dispatch.
//!
//! # Data Flow
//! ```text
//! dispatch_stream(trigger, payload, on_data)
//!     → same setup as dispatch, envelope kind = stream
//!     → transport::open (deadline covers the response head only)
//!         non-2xx: {error} body fails, other JSON is delivered, rest retried
//!     → body chunks → StreamDecoder (gunzip + incremental JSON)
//!     → on_data(item) per top-level element / single value
//!     → on_data(done) exactly once, then onRequestEnd
//! ```

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde_json::Value;

use crate::client::{transport, Call, Client, ClientError, RequestInfo, Response, TransportError};
use crate::codec::stream::aggregate;
use crate::codec::{self, EnvelopeKind, ResponseBody, StreamDecoder};

/// One delivery to a stream callback.
///
/// Items arrive with `done == false`. The last delivery has `done == true`
/// and carries either nothing or the error that ended the stream.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub data: Value,
    pub error: Option<ClientError>,
    pub done: bool,
}

impl StreamChunk {
    fn item(data: Value) -> Self {
        Self {
            data,
            error: None,
            done: false,
        }
    }

    fn done() -> Self {
        Self {
            data: Value::Null,
            error: None,
            done: true,
        }
    }

    fn failed(error: ClientError) -> Self {
        Self {
            data: Value::Null,
            error: Some(error),
            done: true,
        }
    }
}

/// How a stream reply started.
enum Opened {
    /// 2xx head; the body is read as it arrives.
    Live(reqwest::Response),
    /// Non-2xx head whose body was the handler's own payload.
    Buffered { status: u16, body: Bytes },
}

/// What a finished stream leaves behind for the resolved form.
struct StreamEnd {
    was_array: bool,
    info: Option<RequestInfo>,
}

impl Client {
    /// Call `trigger` and receive the reply incrementally through `on_data`.
    pub async fn dispatch_stream<F>(&self, trigger: &str, payload: Value, on_data: F)
    where
        F: FnMut(StreamChunk),
    {
        self.run_stream(trigger, payload, on_data).await;
    }

    /// Like [`dispatch_stream`](Self::dispatch_stream) but collects every item.
    ///
    /// An array reply resolves to the array; a single value to that value;
    /// an empty body to `Null`.
    pub async fn dispatch_stream_resolved(&self, trigger: &str, payload: Value) -> Response {
        let mut items = Vec::new();
        let mut error = None;
        let end = self
            .run_stream(trigger, payload, |chunk| {
                if let Some(e) = chunk.error {
                    error = Some(e);
                } else if !chunk.done {
                    items.push(chunk.data);
                }
            })
            .await;

        match error {
            Some(error) => Response {
                data: Value::Null,
                error: Some(error),
                info: end.info,
            },
            None => Response {
                data: aggregate(items, end.was_array),
                error: None,
                info: end.info,
            },
        }
    }

    async fn run_stream<F>(&self, trigger: &str, payload: Value, mut on_data: F) -> StreamEnd
    where
        F: FnMut(StreamChunk),
    {
        let (call, envelope) = self.begin(trigger, EnvelopeKind::Stream, payload);
        let message = match codec::encode_request(&envelope) {
            Ok(message) => message,
            Err(e) => return self.stream_failed(&call, e.into(), false, &mut on_data),
        };

        let http = &self.transports[call.index];
        let url = &call.endpoint.url;
        let timeout = self.timeout;
        let message = &message;

        let opened = self
            .with_retries(&call, move || async move {
                let response = transport::open(http, url, message, timeout).await?;
                if response.status().is_success() {
                    return Ok(Opened::Live(response));
                }
                let status = response.status().as_u16();
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| ClientError::from(transport::classify(e, timeout)))?;
                rejected_head(status, body)
            })
            .await;

        let (status, mut body) = match opened {
            Ok(Opened::Live(response)) => (response.status().as_u16(), response.bytes_stream().boxed()),
            Ok(Opened::Buffered { status, body }) => {
                let once = stream::once(async move { Ok::<_, reqwest::Error>(body) });
                (status, once.boxed())
            }
            Err(e) => return self.stream_failed(&call, e, false, &mut on_data),
        };

        let mut decoder = StreamDecoder::new();
        let mut size = 0;

        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    let error = transport::classify(e, timeout).into();
                    return self.stream_failed(&call, error, decoder.is_array(), &mut on_data);
                }
            };
            size += bytes.len();
            match decoder.push(&bytes) {
                Ok(items) => items.into_iter().for_each(|item| on_data(StreamChunk::item(item))),
                Err(e) => return self.stream_failed(&call, e.into(), decoder.is_array(), &mut on_data),
            }
        }

        let was_array = decoder.is_array();
        match decoder.finish() {
            Ok(items) => items.into_iter().for_each(|item| on_data(StreamChunk::item(item))),
            Err(e) => return self.stream_failed(&call, e.into(), was_array, &mut on_data),
        }

        on_data(StreamChunk::done());
        StreamEnd {
            was_array,
            info: self.complete(&call, status, size),
        }
    }

    fn stream_failed<F>(&self, call: &Call, error: ClientError, was_array: bool, on_data: &mut F) -> StreamEnd
    where
        F: FnMut(StreamChunk),
    {
        let info = self.report_error(call, &error);
        on_data(StreamChunk::failed(error));
        StreamEnd { was_array, info }
    }
}

/// Sort a non-2xx stream head by its fully read body.
///
/// `{error}` is a remote failure, any other JSON is the handler's payload sent
/// with its own code, and an undecodable body is a transport status.
fn rejected_head(status: u16, body: Bytes) -> Result<Opened, ClientError> {
    let Ok(value) = codec::decode::<Value>(&body) else {
        return Err(TransportError::Status(status).into());
    };
    match serde_json::from_value::<ResponseBody>(value) {
        Ok(ResponseBody {
            error: Some(err), ..
        }) => Err(ClientError::Remote {
            status,
            message: err.message,
        }),
        _ => Ok(Opened::Buffered { status, body }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_head_is_remote() {
        let body = Bytes::from(codec::encode(&ResponseBody::error("Trigger 'x' is not registered on the server")).unwrap());
        match rejected_head(404, body) {
            Err(ClientError::Remote { status, message }) => {
                assert_eq!(status, 404);
                assert!(message.contains("'x'"));
            }
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn payload_head_is_delivered() {
        let body = Bytes::from(codec::encode(&json!(["busy"])).unwrap());
        assert!(matches!(rejected_head(503, body), Ok(Opened::Buffered { status: 503, .. })));
    }

    #[test]
    fn undecodable_head_is_a_status() {
        let body = Bytes::from_static(b"Service Unavailable");
        assert!(matches!(
            rejected_head(503, body),
            Err(ClientError::Transport(TransportError::Status(503)))
        ));
    }
}
