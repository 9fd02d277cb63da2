//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): time to response headers
//! - `proxy_cache_lookups_total` (counter): cache lookups by result
//! - `proxy_cache_entries` (gauge): entries held by the cache
//! - `proxy_rate_limited_total` (counter): requests rejected with 429
//! - `proxy_backend_health` (gauge): 1=up, 0=down

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    ::metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    ::metrics::histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    ::metrics::counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    ::metrics::gauge!("proxy_cache_entries").set(entries as f64);
}

pub fn record_rate_limited() {
    ::metrics::counter!("proxy_rate_limited_total").increment(1);
}

pub fn record_backend_health(backend: &str, up: bool) {
    ::metrics::gauge!("proxy_backend_health", "backend" => backend.to_string())
        .set(if up { 1.0 } else { 0.0 });
}
