//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{backend::Backend, LoadBalancer};

/// Round-robin selector.
///
/// One counter is shared across calls and taken modulo the size of whatever
/// active set the caller passes in. When that set changes size between calls
/// the rotation shifts; distribution is only even while the set is stable.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>> {
        if backends.is_empty() {
            return None;
        }

        // fetch_add hands every concurrent caller a distinct ticket
        let ticket = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(backends[ticket % backends.len()].clone())
    }
}
