//! The forwarding pipeline: one request, end to end.
//!
//! Rate limiting already ran as middleware by the time [`proxy_handler`] is
//! called. From there: cache lookup, backend selection, forwarding, and the
//! cache write once the streamed response completes.

use std::time::Instant;

use axum::{
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use tokio::time;

use crate::cache::cache_key;
use crate::error::ProxyError;
use crate::http::request::{upstream_request, X_REQUEST_ID};
use crate::http::response::{cached_response, forward_response};
use crate::http::server::AppState;
use crate::load_balancer::Backend;
use crate::observability::metrics;

/// Main proxy handler.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let key = cache_key(&method, request.uri());
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if let Some(cache) = &state.cache {
        if let Some(entry) = cache.lookup(&key) {
            tracing::debug!(request_id = %request_id, key = %key, "Cache hit");
            metrics::record_cache_lookup(true);
            metrics::record_request(method.as_str(), entry.status.as_u16(), "cache", start);
            return cached_response(&entry);
        }
        tracing::debug!(request_id = %request_id, key = %key, "Cache miss");
        metrics::record_cache_lookup(false);
    }

    let backend = match state.pool.select_backend() {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(request_id = %request_id, key = %key, "No active backends, all servers are down");
            metrics::record_request(method.as_str(), e.status_code().as_u16(), "none", start);
            return e.into_response();
        }
    };

    tracing::debug!(request_id = %request_id, backend = %backend, "Routing request");

    match forward(&state, request, &backend, key).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), &backend.name, start);
            response
        }
        Err(e) => {
            match &e {
                ProxyError::BackendUnreachable { .. } => {
                    tracing::warn!(request_id = %request_id, backend = %backend, error = %e, "Upstream request failed")
                }
                _ => tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Proxy error"),
            }
            metrics::record_request(method.as_str(), e.status_code().as_u16(), &backend.name, start);
            e.into_response()
        }
    }
}

/// Send the request to `backend` and stream its response back.
///
/// Backend failures do not touch the pool; the next health probe decides.
async fn forward(
    state: &AppState,
    request: Request,
    backend: &Backend,
    key: String,
) -> Result<Response, ProxyError> {
    let upstream = upstream_request(request, backend, state.rewrite_host)?;

    let response = match time::timeout(state.response_timeout, state.client.request(upstream)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            return Err(ProxyError::BackendUnreachable {
                backend: backend.authority(),
                reason: describe(&e),
            })
        }
        Err(_) => {
            return Err(ProxyError::BackendUnreachable {
                backend: backend.authority(),
                reason: format!("no response within {:?}", state.response_timeout),
            })
        }
    };

    let capture = state.cache.clone().map(|cache| (cache, key));
    Ok(forward_response(response, capture))
}

/// hyper-util's client error only names the failure kind; include the cause.
fn describe(error: &hyper_util::client::legacy::Error) -> String {
    match std::error::Error::source(error) {
        Some(source) => format!("{}: {}", error, source),
        None => error.to_string(),
    }
}
