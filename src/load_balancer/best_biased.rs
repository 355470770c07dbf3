//! Best-biased load balancing strategy (default).

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::config::LoadBalancerStrategy;
use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Number of lowest-latency candidates drawn from.
const CANDIDATES: usize = 2;

/// Sorts endpoints by average latency (cold = +inf) and picks uniformly
/// among the best two.
#[derive(Debug, Default)]
pub struct BestBiased;

impl BestBiased {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for BestBiased {
    fn strategy(&self) -> LoadBalancerStrategy {
        LoadBalancerStrategy::BestBiased
    }

    fn next_server(&self, endpoints: &[Arc<Endpoint>], rng: &mut dyn RngCore) -> Option<usize> {
        if endpoints.is_empty() {
            return None;
        }

        let mut ranked: Vec<(usize, f64)> = endpoints
            .iter()
            .enumerate()
            .map(|(index, e)| (index, e.average_ms()))
            .collect();
        // stable: equal averages keep construction order
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let candidates = &ranked[..CANDIDATES.min(ranked.len())];
        Some(candidates[rng.gen_range(0..candidates.len())].0)
    }
}
