//! Least Connections load balancing strategy.

use std::sync::Arc;

use rand::RngCore;

use crate::config::LoadBalancerStrategy;
use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Least connections selector.
/// Selects the endpoint with the minimum request count.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn strategy(&self) -> LoadBalancerStrategy {
        LoadBalancerStrategy::LeastConnection
    }

    fn next_server(&self, endpoints: &[Arc<Endpoint>], _rng: &mut dyn RngCore) -> Option<usize> {
        // In case of tie, the first one is selected (stability)
        endpoints
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.active_requests())
            .map(|(index, _)| index)
    }
}
