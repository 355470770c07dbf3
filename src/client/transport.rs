//! HTTP transport for one endpoint.
//!
//! # Responsibilities
//! - Build a `reqwest::Client` carrying the endpoint's TLS material
//! - POST one wire message under a deadline
//! - Classify `reqwest` failures into [`TransportError`]
//!
//! # Design Decisions
//! - One HTTP client per endpoint so trust settings never leak across servers
//! - Response bodies are gzip and decoded by the codec, not by `reqwest`
//! - TLS runs on rustls on both sides; a trust failure is a `rustls::Error`
//!   somewhere in the source chain
//! - TLS problems are recognized before connect errors, since a failed
//!   handshake is also reported as a connect error

use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::client::error::{ClientError, TransportError};
use crate::codec::WireMessage;
use crate::config::ClientTlsConfig;

/// Build the HTTP client for one endpoint.
pub fn build_http_client(tls: Option<&ClientTlsConfig>) -> Result<reqwest::Client, ClientError> {
    let mut builder = reqwest::Client::builder().use_rustls_tls();

    if let Some(tls) = tls {
        if let Some(ca_path) = &tls.ca_path {
            let pem = std::fs::read(ca_path)
                .map_err(|e| ClientError::Config(format!("failed to read CA {ca_path:?}: {e}")))?;
            let cert = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| ClientError::Config(format!("invalid CA {ca_path:?}: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        match (&tls.cert_path, &tls.key_path) {
            (Some(cert_path), Some(key_path)) => {
                let mut pem = std::fs::read(key_path)
                    .map_err(|e| ClientError::Config(format!("failed to read {key_path:?}: {e}")))?;
                let cert = std::fs::read(cert_path)
                    .map_err(|e| ClientError::Config(format!("failed to read {cert_path:?}: {e}")))?;
                pem.push(b'\n');
                pem.extend_from_slice(&cert);
                let identity = reqwest::Identity::from_pem(&pem)
                    .map_err(|e| ClientError::Config(format!("invalid client identity: {e}")))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => {
                return Err(ClientError::Config(
                    "client TLS needs both cert_path and key_path".to_string(),
                ))
            }
        }

        if tls.accept_invalid_certs {
            tracing::warn!("Certificate verification disabled for endpoint");
            builder = builder.danger_accept_invalid_certs(true);
        }
    }

    builder
        .build()
        .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))
}

/// Whether a rustls error sits anywhere in the chain.
///
/// `io::Error` hides its payload from `source()`, so wrapped payloads are
/// unpacked explicitly.
pub(crate) fn is_tls_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<rustls::Error>() {
            return true;
        }
        if let Some(inner) = e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            if is_tls_failure(inner) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

pub(crate) fn classify(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout(timeout);
    }
    if is_tls_failure(&err) {
        return TransportError::TlsTrust(Arc::new(err));
    }
    if err.is_connect() {
        return TransportError::Unreachable(Arc::new(err));
    }
    TransportError::Network(Arc::new(err))
}

/// POST and read the whole body. The deadline covers both.
pub(crate) async fn exchange(
    http: &reqwest::Client,
    url: &Url,
    message: &WireMessage,
    timeout: Duration,
) -> Result<(u16, Bytes), TransportError> {
    let call = async {
        let response = http.post(url.clone()).json(message).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, body))
    };
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(e)) => Err(classify(e, timeout)),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

/// POST and return as soon as the status line and headers arrive.
pub(crate) async fn open(
    http: &reqwest::Client,
    url: &Url,
    message: &WireMessage,
    timeout: Duration,
) -> Result<reqwest::Response, TransportError> {
    match tokio::time::timeout(timeout, http.post(url.clone()).json(message).send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(classify(e, timeout)),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}
