//! Backend pool management.
//!
//! # Responsibilities
//! - Own the static set of backends, in configuration order
//! - Expose the active subset and status transitions
//! - Apply the load balancing algorithm to select a backend

use std::sync::Arc;

use crate::config::BackendConfig;
use crate::error::ProxyError;
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin, LoadBalancer};
use crate::observability::metrics;

/// The set of known backends and their up/down status.
#[derive(Debug)]
pub struct BackendPool {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

impl BackendPool {
    /// Create a pool from configuration, balancing with round-robin.
    pub fn new(configs: &[BackendConfig]) -> Self {
        Self::with_balancer(configs, Box::new(RoundRobin::new()))
    }

    pub fn with_balancer(configs: &[BackendConfig], balancer: Box<dyn LoadBalancer>) -> Self {
        let mut backends = Vec::with_capacity(configs.len());
        for config in configs {
            match Backend::new(config.name.clone(), &config.address) {
                Some(backend) => backends.push(Arc::new(backend)),
                None => tracing::warn!(
                    name = %config.name,
                    address = %config.address,
                    "Invalid backend address, skipping"
                ),
            }
        }
        Self { backends, balancer }
    }

    /// Healthy backends only, in configuration order.
    pub fn list_active(&self) -> Vec<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_up())
            .cloned()
            .collect()
    }

    /// Every backend regardless of status (for health checking).
    pub fn all_backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Pick the next backend from the currently active subset.
    pub fn select_backend(&self) -> Result<Arc<Backend>, ProxyError> {
        let active = self.list_active();
        self.balancer
            .next_server(&active)
            .ok_or(ProxyError::NoBackendsAvailable)
    }

    pub fn mark_up(&self, backend: &Backend) {
        if backend.set_up(true) {
            tracing::info!(backend = %backend, "Backend is back online");
        }
        metrics::record_backend_health(&backend.name, true);
    }

    pub fn mark_down(&self, backend: &Backend) {
        if backend.set_up(false) {
            tracing::warn!(backend = %backend, "Backend is down, removing from rotation");
        }
        metrics::record_backend_health(&backend.name, false);
    }
}
