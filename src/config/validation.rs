//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts >= 1, epsilon in [0, 1])
//! - Detect duplicate allow-list keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: config → Result<(), Vec<ValidationError>>

use std::collections::HashSet;

use url::Url;

use crate::config::schema::{ClientConfig, ServerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no endpoints configured")]
    NoEndpoints,
    #[error("endpoint '{0}' is not an http(s) URL")]
    InvalidEndpoint(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("epsilon must be within [0, 1]")]
    EpsilonOutOfRange,
    #[error("duplicate client secretKey '{0}'")]
    DuplicateSecretKey(String),
    #[error("client entry with an empty secretKey")]
    EmptySecretKey,
    #[error("client certificate required but no CA bundle configured")]
    MissingClientCa,
}

pub fn validate_client_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoints.is_empty() {
        errors.push(ValidationError::NoEndpoints);
    }
    for endpoint in &config.endpoints {
        let valid = Url::parse(&endpoint.address)
            .map(|u| matches!(u.scheme(), "http" | "https"))
            .unwrap_or(false);
        if !valid {
            errors.push(ValidationError::InvalidEndpoint(endpoint.address.clone()));
        }
    }
    if config.timeout_ms == 0 {
        errors.push(ValidationError::Zero("timeout_ms"));
    }
    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::Zero("retry.max_attempts"));
    }
    if !(0.0..=1.0).contains(&config.epsilon) {
        errors.push(ValidationError::EpsilonOutOfRange);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn validate_server_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for client in &config.clients {
        if client.secret_key.is_empty() {
            errors.push(ValidationError::EmptySecretKey);
        } else if !seen.insert(client.secret_key.as_str()) {
            errors.push(ValidationError::DuplicateSecretKey(client.secret_key.clone()));
        }
    }
    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::Zero("request_timeout_secs"));
    }
    if config.max_body_bytes == 0 {
        errors.push(ValidationError::Zero("max_body_bytes"));
    }
    if let Some(tls) = &config.tls {
        if tls.require_client_cert && tls.ca_path.is_none() {
            errors.push(ValidationError::MissingClientCa);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
