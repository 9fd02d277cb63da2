//! Admin API: read-only view of pool, cache and limiter state.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::cache::CacheStore;
use crate::load_balancer::BackendPool;
use crate::security::RateLimiter;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared handles the admin handlers read from.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub cache: Arc<CacheStore>,
    pub limiter: Arc<RateLimiter>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .route("/admin/cache", get(get_cache))
        .route("/admin/rate-limits", get(get_rate_limits))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve(listener: TcpListener, state: AdminState, mut shutdown: broadcast::Receiver<()>) {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Admin API listening");
    }

    let result = axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await;

    if let Err(e) = result {
        tracing::error!(error = %e, "Admin API stopped with error");
    }
}
