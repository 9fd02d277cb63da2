//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build every subsystem from the configuration
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (request ID, tracing, rate limit, secure headers)
//! - Spawn background tasks (health monitor, sweepers, admin API)
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, middleware, routing::any, Router};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::{self, AdminState};
use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::health::HealthMonitor;
use crate::http::pipeline::proxy_handler;
use crate::http::request::UuidRequestId;
use crate::load_balancer::BackendPool;
use crate::security::headers::apply_security_headers;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<BackendPool>,
    /// `None` when caching is disabled.
    pub cache: Option<Arc<CacheStore>>,
    pub client: Client<HttpConnector, Body>,
    pub response_timeout: Duration,
    pub rewrite_host: bool,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<BackendPool>,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let pool = Arc::new(BackendPool::new(&config.backends));
        let cache = Arc::new(CacheStore::new(&config.cache));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            pool: pool.clone(),
            cache: config.cache.enabled.then(|| cache.clone()),
            client,
            response_timeout: Duration::from_secs(config.timeouts.response_secs),
            rewrite_host: config.upstream.rewrite_host,
        };

        let router = Self::build_router(&config, state, limiter.clone());
        Self {
            router,
            config,
            pool,
            cache,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layer order, outermost first: request ID, tracing, secure headers,
    /// rate limit, handler.
    fn build_router(config: &ProxyConfig, state: AppState, limiter: Arc<RateLimiter>) -> Router {
        let mut router = Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state);

        if config.rate_limit.enabled {
            router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
        }

        apply_security_headers(router, &config.security).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            backends = self.pool.all_backends().len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let monitor = HealthMonitor::new(self.pool.clone(), self.config.health_check.clone());
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        }

        if self.config.cache.enabled {
            let interval = Duration::from_secs(self.config.cache.sweep_interval_secs);
            tokio::spawn(self.cache.clone().run_sweeper(interval, shutdown.resubscribe()));
        }

        if self.config.rate_limit.enabled {
            let interval = Duration::from_secs(self.config.rate_limit.sweep_interval_secs);
            tokio::spawn(self.limiter.clone().run_sweeper(interval, shutdown.resubscribe()));
        }

        if self.config.admin.enabled {
            match TcpListener::bind(&self.config.admin.bind_address).await {
                Ok(admin_listener) => {
                    tokio::spawn(admin::serve(admin_listener, self.admin_state(), shutdown.resubscribe()));
                }
                Err(e) => tracing::error!(
                    address = %self.config.admin.bind_address,
                    error = %e,
                    "Failed to bind admin listener, admin API disabled"
                ),
            }
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn backend_pool(&self) -> Arc<BackendPool> {
        self.pool.clone()
    }

    /// State for the admin API, sharing this server's subsystems.
    pub fn admin_state(&self) -> AdminState {
        AdminState {
            pool: self.pool.clone(),
            cache: self.cache.clone(),
            limiter: self.limiter.clone(),
            api_key: Arc::from(self.config.admin.api_key.as_str()),
        }
    }
}
