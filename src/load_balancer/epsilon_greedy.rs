//! Epsilon-greedy load balancing strategy.

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::config::LoadBalancerStrategy;
use crate::load_balancer::{best_biased::BestBiased, endpoint::Endpoint, LoadBalancer};

/// Default exploration probability.
pub const DEFAULT_EPSILON: f64 = 0.1;

/// Explores a uniformly random endpoint with probability `epsilon`,
/// otherwise exploits via [`BestBiased`].
#[derive(Debug)]
pub struct EpsilonGreedy {
    epsilon: f64,
    exploit: BestBiased,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
            exploit: BestBiased::new(),
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON)
    }
}

impl LoadBalancer for EpsilonGreedy {
    fn strategy(&self) -> LoadBalancerStrategy {
        LoadBalancerStrategy::EpsilonGreedy
    }

    fn next_server(&self, endpoints: &[Arc<Endpoint>], rng: &mut dyn RngCore) -> Option<usize> {
        if endpoints.is_empty() {
            return None;
        }
        if rng.gen::<f64>() < self.epsilon {
            return Some(rng.gen_range(0..endpoints.len()));
        }
        self.exploit.next_server(endpoints, rng)
    }
}
