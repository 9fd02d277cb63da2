use axum::{extract::State, Json};
use serde::Serialize;
use std::time::UNIX_EPOCH;

use crate::admin::AdminState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub active_backends: usize,
    pub total_backends: usize,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub address: String,
    pub up: bool,
    /// Seconds since the Unix epoch.
    pub last_transition: u64,
}

#[derive(Serialize)]
pub struct CacheStatus {
    pub entries: usize,
    pub ttl_secs: u64,
    pub max_body_bytes: usize,
}

#[derive(Serialize)]
pub struct RateLimitStatus {
    pub tracked_clients: usize,
    pub window_secs: u64,
    pub max_requests: u32,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let active = state.pool.list_active().len();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if active > 0 { "operational" } else { "degraded" },
        active_backends: active,
        total_backends: state.pool.all_backends().len(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .all_backends()
        .iter()
        .map(|b| BackendStatus {
            name: b.name.clone(),
            address: b.authority(),
            up: b.is_up(),
            last_transition: b
                .last_transition()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        })
        .collect();

    Json(statuses)
}

pub async fn get_cache(State(state): State<AdminState>) -> Json<CacheStatus> {
    Json(CacheStatus {
        entries: state.cache.len(),
        ttl_secs: state.cache.default_ttl().as_secs(),
        max_body_bytes: state.cache.max_body_bytes(),
    })
}

pub async fn get_rate_limits(State(state): State<AdminState>) -> Json<RateLimitStatus> {
    Json(RateLimitStatus {
        tracked_clients: state.limiter.tracked_clients(),
        window_secs: state.limiter.window().as_secs(),
        max_requests: state.limiter.max_requests(),
    })
}
