//! Per-client fixed-window rate limiting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::RateLimitConfig;
use crate::error::ProxyError;
use crate::observability::metrics;

/// Outcome of [`RateLimiter::admit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

/// Request count for one client inside its current window.
#[derive(Debug, Clone, Copy)]
struct WindowRecord {
    count: u32,
    window_start: Instant,
}

/// Fixed-window limiter keyed by client id.
///
/// A client that keeps sending while rejected stays rejected: rejected
/// requests still count toward the window. Across a window boundary a client
/// can get up to twice the limit through.
#[derive(Debug)]
pub struct RateLimiter {
    records: DashMap<String, WindowRecord>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.window(), config.max_requests)
    }

    pub fn with_limits(window: Duration, max_requests: u32) -> Self {
        Self {
            records: DashMap::new(),
            window,
            max_requests,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `client_id` and decide whether to let it through.
    pub fn admit(&self, client_id: &str) -> Admission {
        self.admit_at(client_id, Instant::now())
    }

    fn admit_at(&self, client_id: &str, now: Instant) -> Admission {
        // the entry guard serializes concurrent requests from the same client
        match self.records.entry(client_id.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(WindowRecord { count: 1, window_start: now });
                Admission::Allowed
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();
                if now.saturating_duration_since(record.window_start) > self.window {
                    record.count = 1;
                    record.window_start = now;
                    return Admission::Allowed;
                }

                record.count = record.count.saturating_add(1);
                if record.count > self.max_requests {
                    Admission::Rejected
                } else {
                    Admission::Allowed
                }
            }
        }
    }

    /// Drop records whose window has elapsed. The next request from such a
    /// client starts a fresh window either way. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, r| now.saturating_duration_since(r.window_start) <= self.window);
        before.saturating_sub(self.records.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.records.len()
    }

    /// Periodically sweep stale records until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, tracked = self.tracked_clients(), "Swept rate limit records");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate limit sweeper stopping");
                    break;
                }
            }
        }
    }
}

/// Middleware rejecting clients over their limit with 429.
///
/// Runs ahead of the cache so rate-limited clients cannot be served hits.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client = addr.ip().to_string();

    match limiter.admit(&client) {
        Admission::Allowed => next.run(request).await,
        Admission::Rejected => {
            // client-caused; not a system error
            tracing::info!(client = %client, "Rate limit exceeded");
            metrics::record_rate_limited();
            ProxyError::RateLimitExceeded { client }.into_response()
        }
    }
}
