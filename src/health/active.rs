//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe backends
//! - Update backend status in the pool based on results

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Backend, BackendPool};

/// Why a single probe failed.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe url: {0}")]
    Url(#[from] url::ParseError),

    #[error("failed to build probe request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("connection error: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub struct HealthMonitor {
    pool: Arc<BackendPool>,
    config: HealthCheckConfig,
    client: Client<HttpConnector, Body>,
}

impl HealthMonitor {
    pub fn new(pool: Arc<BackendPool>, config: HealthCheckConfig) -> Self {
        // no idle connections: a probe's socket closes with the probe
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Self {
            pool,
            config,
            client,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently, and update the pool.
    pub async fn check_all(&self) {
        let probes = self.pool.all_backends().iter().map(|backend| async move {
            match self.probe(backend).await {
                Ok(()) => self.pool.mark_up(backend),
                Err(e) => {
                    tracing::debug!(backend = %backend, error = %e, "Health probe failed");
                    self.pool.mark_down(backend);
                }
            }
        });
        join_all(probes).await;
    }

    async fn probe(&self, backend: &Backend) -> Result<(), ProbeError> {
        let url = backend.base_url.join(&self.config.path)?;
        let request = Request::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(header::USER_AGENT, "caching-balancer-health-check")
            .body(Body::empty())?;

        let timeout = self.config.timeout();
        // dropping the timed-out future closes the probe connection
        let response = time::timeout(timeout, self.client.request(request))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))??;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(ProbeError::Status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `response` verbatim to every connection, or stall when `None`.
    async fn fixed_backend(response: Option<&'static str>) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    match response {
                        Some(raw) => {
                            let _ = socket.write_all(raw.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        None => time::sleep(Duration::from_secs(30)).await,
                    }
                });
            }
        });
        addr
    }

    async fn closed_port() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    fn monitor(addrs: &[(&str, SocketAddr)]) -> HealthMonitor {
        let configs: Vec<_> = addrs
            .iter()
            .map(|(name, addr)| BackendConfig::new(*name, addr.to_string()))
            .collect();
        let config = HealthCheckConfig {
            timeout_secs: 1,
            ..Default::default()
        };
        HealthMonitor::new(Arc::new(BackendPool::new(&configs)), config)
    }

    const OK: &str = "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok";
    const ERROR: &str =
        "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn test_probe_outcomes() {
        let healthy = fixed_backend(Some(OK)).await;
        let failing = fixed_backend(Some(ERROR)).await;
        let stalled = fixed_backend(None).await;
        let refused = closed_port().await;

        let monitor = monitor(&[
            ("healthy", healthy),
            ("failing", failing),
            ("stalled", stalled),
            ("refused", refused),
        ]);
        monitor.check_all().await;

        let active: Vec<_> = monitor
            .pool
            .list_active()
            .iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(active, ["healthy"]);
    }

    #[tokio::test]
    async fn test_recovery() {
        let refused = closed_port().await;
        let monitor = monitor(&[("flaky", refused)]);
        monitor.check_all().await;
        assert!(monitor.pool.list_active().is_empty());

        // a server comes up on the same port
        let listener = TcpListener::bind(refused).await.unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(OK.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        monitor.check_all().await;
        assert_eq!(monitor.pool.list_active().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_bounded() {
        let stalled = fixed_backend(None).await;
        let monitor = monitor(&[("stalled", stalled)]);

        let started = time::Instant::now();
        monitor.check_all().await;
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(monitor.pool.list_active().is_empty());
    }
}
