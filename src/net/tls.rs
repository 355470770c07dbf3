//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Read PEM certificate chain and private key for the listener
//! - Optionally verify client certificates against a CA bundle (mutual TLS)
//!
//! # Design Decisions
//! - Paths are checked up front so a missing file names itself in the error
//! - The crypto provider is chosen explicitly instead of relying on a
//!   process-wide default

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;

use crate::config::ServerTlsConfig;

/// Error building the listener's TLS configuration.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no certificates found in {0:?}")]
    NoCertificates(PathBuf),
    #[error("no private key found in {0:?}")]
    NoPrivateKey(PathBuf),
    #[error("rustls: {0}")]
    Rustls(#[from] rustls::Error),
    #[error("client certificate verifier: {0}")]
    Verifier(#[from] rustls::server::VerifierBuilderError),
}

async fn read(path: &Path) -> Result<Vec<u8>, TlsError> {
    tokio::fs::read(path).await.map_err(|source| TlsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

async fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let pem = read(path).await?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

async fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let pem = read(path).await?;
    rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(path.to_path_buf()))
}

/// Build the listener's rustls configuration.
pub async fn load_server_tls(config: &ServerTlsConfig) -> Result<RustlsConfig, TlsError> {
    let certs = load_certs(&config.cert_path).await?;
    let key = load_key(&config.key_path).await?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let builder = rustls::ServerConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let mut server_config = match &config.ca_path {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in load_certs(ca_path).await? {
                roots.add(cert)?;
            }
            let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider);
            let verifier = if config.require_client_cert {
                verifier.build()?
            } else {
                verifier.allow_unauthenticated().build()?
            };
            tracing::debug!(ca = ?ca_path, required = config.require_client_cert, "Client certificate verification enabled");
            builder.with_client_cert_verifier(verifier).with_single_cert(certs, key)?
        }
        None => builder.with_no_client_auth().with_single_cert(certs, key)?,
    };
    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_cert_names_the_path() {
        let config = ServerTlsConfig {
            cert_path: "/nonexistent/cert.pem".into(),
            key_path: "/nonexistent/key.pem".into(),
            ca_path: None,
            require_client_cert: false,
        };
        match load_server_tls(&config).await {
            Err(TlsError::Io { path, .. }) => assert_eq!(path, PathBuf::from("/nonexistent/cert.pem")),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/tls").join(name)
    }

    #[tokio::test]
    async fn fixture_material_loads() {
        let mut config = ServerTlsConfig {
            cert_path: fixture("server.pem"),
            key_path: fixture("server-key.pem"),
            ca_path: None,
            require_client_cert: false,
        };
        assert!(load_server_tls(&config).await.is_ok());

        config.ca_path = Some(fixture("ca.pem"));
        assert!(load_server_tls(&config).await.is_ok());

        config.require_client_cert = true;
        assert!(load_server_tls(&config).await.is_ok());
    }

    #[tokio::test]
    async fn certificate_as_key_is_rejected() {
        let config = ServerTlsConfig {
            cert_path: fixture("server.pem"),
            key_path: fixture("server.pem"),
            ca_path: None,
            require_client_cert: false,
        };
        assert!(matches!(load_server_tls(&config).await, Err(TlsError::NoPrivateKey(_))));
    }

    #[tokio::test]
    async fn pem_without_certificates_is_rejected() {
        let path = std::env::temp_dir().join(format!("cromio-empty-{}.pem", std::process::id()));
        tokio::fs::write(&path, b"not a pem file\n").await.unwrap();
        let config = ServerTlsConfig {
            cert_path: path.clone(),
            key_path: path.clone(),
            ca_path: None,
            require_client_cert: false,
        };
        let result = load_server_tls(&config).await;
        assert!(matches!(result, Err(TlsError::NoCertificates(_))));
        let _ = tokio::fs::remove_file(path).await;
    }
}
