//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, limits > 0)
//! - Validate backend addresses and detect duplicate backends
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::HeaderValue;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::load_balancer::backend::parse_address;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one backend must be configured")]
    NoBackends,

    #[error("backend '{name}' has invalid address '{address}'")]
    InvalidBackendAddress { name: String, address: String },

    #[error("backend '{name}' duplicates address {address}")]
    DuplicateBackend { name: String, address: String },

    #[error("backend name '{0}' is used more than once")]
    DuplicateBackendName(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("health check path '{0}' must start with '/'")]
    InvalidHealthPath(String),

    #[error("powered_by '{0}' is not a valid header value")]
    InvalidPoweredBy(String),

    #[error("admin.api_key must be set when the admin API is enabled")]
    EmptyAdminKey,
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    let mut names = HashSet::new();
    for backend in &config.backends {
        // names label metrics and admin output
        if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackendName(backend.name.clone()));
        }
        match parse_address(&backend.address) {
            Some((host, port)) => {
                if !seen.insert((host.to_ascii_lowercase(), port)) {
                    errors.push(ValidationError::DuplicateBackend {
                        name: backend.name.clone(),
                        address: backend.address.clone(),
                    });
                }
            }
            None => errors.push(ValidationError::InvalidBackendAddress {
                name: backend.name.clone(),
                address: backend.address.clone(),
            }),
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.admin.bind_address.clone(),
        ));
    }
    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::EmptyAdminKey);
    }

    let ranges = [
        ("health_check.interval_secs", config.health_check.interval_secs),
        ("health_check.timeout_secs", config.health_check.timeout_secs),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.response_secs", config.timeouts.response_secs),
        ("rate_limit.window_secs", config.rate_limit.window_secs),
        ("rate_limit.max_requests", u64::from(config.rate_limit.max_requests)),
        ("rate_limit.sweep_interval_secs", config.rate_limit.sweep_interval_secs),
        ("cache.ttl_secs", config.cache.ttl_secs),
        ("cache.sweep_interval_secs", config.cache.sweep_interval_secs),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }

    if !config.health_check.path.starts_with('/') {
        errors.push(ValidationError::InvalidHealthPath(
            config.health_check.path.clone(),
        ));
    }

    if HeaderValue::from_str(&config.security.powered_by).is_err() {
        errors.push(ValidationError::InvalidPoweredBy(
            config.security.powered_by.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
