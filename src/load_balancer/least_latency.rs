//! Least Latency load balancing strategy.

use std::sync::Arc;

use rand::RngCore;

use crate::config::LoadBalancerStrategy;
use crate::load_balancer::{endpoint::Endpoint, LoadBalancer};

/// Picks the endpoint with the lowest average latency.
/// An endpoint without samples is picked immediately so it gets measured.
#[derive(Debug, Default)]
pub struct LeastLatency;

impl LeastLatency {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastLatency {
    fn strategy(&self) -> LoadBalancerStrategy {
        LoadBalancerStrategy::LeastLatency
    }

    fn next_server(&self, endpoints: &[Arc<Endpoint>], _rng: &mut dyn RngCore) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (index, endpoint) in endpoints.iter().enumerate() {
            let avg = endpoint.average_ms();
            if avg.is_infinite() {
                return Some(index);
            }
            if best.map_or(true, |(_, min)| avg < min) {
                best = Some((index, avg));
            }
        }
        best.map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::tests::{endpoints, rng};
    use std::time::Duration;

    #[test]
    fn cold_endpoint_wins() {
        let pool = endpoints(3);
        pool[0].record_latency(Duration::from_millis(1));
        pool[2].record_latency(Duration::from_millis(1));
        assert_eq!(LeastLatency::new().next_server(&pool, &mut rng()), Some(1));
    }

    #[test]
    fn lowest_average_wins() {
        let pool = endpoints(3);
        pool[0].record_latency(Duration::from_millis(30));
        pool[1].record_latency(Duration::from_millis(50));
        pool[1].record_latency(Duration::from_millis(5)); // avg 27.5
        pool[2].record_latency(Duration::from_millis(28));
        assert_eq!(LeastLatency::new().next_server(&pool, &mut rng()), Some(1));
    }

    #[test]
    fn ties_go_to_lowest_index() {
        let pool = endpoints(2);
        pool[0].record_latency(Duration::from_millis(7));
        pool[1].record_latency(Duration::from_millis(7));
        assert_eq!(LeastLatency::new().next_server(&pool, &mut rng()), Some(0));
    }
}
