//! Load balancing subsystem (client side).
//!
//! # Data Flow
//! ```text
//! Client::dispatch
//!     → pool.rs (fixed endpoint list, index = construction order)
//!     → Apply load balancing algorithm:
//!         - least_conn.rs (fewest completed dispatches)
//!         - least_latency.rs (lowest average, cold endpoints first)
//!         - best_biased.rs (random among the two fastest; default)
//!         - epsilon_greedy.rs (random with probability ε, else best-biased)
//!     → (endpoint, index)
//!     → after the call: record latency + bump request count
//! ```
//!
//! # Design Decisions
//! - Strategies are stateless; the pool owns counters and history
//! - Selection reads a snapshot; concurrent calls may pick the same endpoint
//! - Randomness is injected so strategies are deterministic under test

pub mod best_biased;
pub mod endpoint;
pub mod epsilon_greedy;
pub mod least_conn;
pub mod least_latency;
pub mod pool;

use std::fmt::Debug;
use std::sync::Arc;

use rand::RngCore;

use crate::config::LoadBalancerStrategy;

pub use endpoint::{Endpoint, HISTORY_LIMIT};
pub use pool::ServerPool;

/// A selection algorithm over the endpoint pool.
pub trait LoadBalancer: Send + Sync + Debug {
    /// The strategy this balancer implements (reported in request info).
    fn strategy(&self) -> LoadBalancerStrategy;

    /// Index of the endpoint that should take the next call.
    /// `None` only for an empty slice.
    fn next_server(&self, endpoints: &[Arc<Endpoint>], rng: &mut dyn RngCore) -> Option<usize>;
}

/// Build the balancer for a configured strategy.
pub fn for_strategy(strategy: LoadBalancerStrategy, epsilon: f64) -> Box<dyn LoadBalancer> {
    match strategy {
        LoadBalancerStrategy::LeastConnection => Box::new(least_conn::LeastConnections::new()),
        LoadBalancerStrategy::LeastLatency => Box::new(least_latency::LeastLatency::new()),
        LoadBalancerStrategy::BestBiased => Box::new(best_biased::BestBiased::new()),
        LoadBalancerStrategy::EpsilonGreedy => Box::new(epsilon_greedy::EpsilonGreedy::new(epsilon)),
    }
}
