//! Endpoint pool management.
//!
//! # Responsibilities
//! - Own the fixed list of endpoints (index space never changes)
//! - Apply the configured load balancing algorithm
//! - Record per-call outcomes (latency, request count)

use std::sync::Arc;
use std::time::Duration;

use rand::RngCore;

use crate::config::{EndpointConfig, LoadBalancerStrategy};
use crate::load_balancer::{endpoint::Endpoint, for_strategy, LoadBalancer};

/// Error building a pool from configuration.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("at least one server endpoint is required")]
    Empty,
    #[error("invalid endpoint address '{address}': {source}")]
    InvalidAddress {
        address: String,
        source: url::ParseError,
    },
}

/// Endpoints plus the algorithm that chooses among them.
#[derive(Debug)]
pub struct ServerPool {
    endpoints: Vec<Arc<Endpoint>>,
    balancer: Box<dyn LoadBalancer>,
}

impl ServerPool {
    /// Create a pool from configuration. Fails on an empty list.
    pub fn new(
        configs: &[EndpointConfig],
        strategy: LoadBalancerStrategy,
        epsilon: f64,
    ) -> Result<Self, PoolError> {
        if configs.is_empty() {
            return Err(PoolError::Empty);
        }
        let endpoints = configs
            .iter()
            .map(|config| {
                let url = config.address.parse().map_err(|source| PoolError::InvalidAddress {
                    address: config.address.clone(),
                    source,
                })?;
                Ok(Arc::new(Endpoint::new(url, config.tls.clone(), config.secret_key.clone())))
            })
            .collect::<Result<Vec<_>, PoolError>>()?;

        Ok(Self {
            endpoints,
            balancer: for_strategy(strategy, epsilon),
        })
    }

    /// Select the endpoint for the next call.
    pub fn pick(&self, rng: &mut dyn RngCore) -> (Arc<Endpoint>, usize) {
        // pool is never empty, so the balancer always answers; 0 is a safe fallback
        let index = self
            .balancer
            .next_server(&self.endpoints, rng)
            .filter(|i| *i < self.endpoints.len())
            .unwrap_or(0);
        tracing::trace!(index, strategy = %self.balancer.strategy(), "Endpoint selected");
        (self.endpoints[index].clone(), index)
    }

    /// Record a completed call: latency sample plus request count.
    /// Returns the endpoint's new request count.
    pub fn record_completion(&self, index: usize, latency: Duration) -> usize {
        let endpoint = &self.endpoints[index];
        endpoint.record_latency(latency);
        endpoint.inc_requests()
    }

    pub fn strategy(&self) -> LoadBalancerStrategy {
        self.balancer.strategy()
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
