//! Caching round-robin load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ rate limit ──▶ cache lookup ──hit──▶ X-Cache: HIT
//!                     (per IP)            │
//!                                         │ miss
//!                                         ▼
//!                                  round robin over
//!                                  healthy backends ──none──▶ 500
//!                                         │
//!                                         ▼
//!     Client Response ◀── tee body ◀── backend ──error──▶ 502
//!                         into cache
//!
//!     Background: health monitor, cache sweeper, rate limit sweeper,
//!                 admin API, Prometheus exporter
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use caching_balancer::config::{load_config, BackendConfig, ProxyConfig};
use caching_balancer::lifecycle::Shutdown;
use caching_balancer::observability::{logging, metrics};
use caching_balancer::HttpServer;

#[derive(Parser)]
#[command(name = "caching-balancer")]
#[command(about = "Caching round-robin HTTP load balancer", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Without a config file, balance across the three local demo backends.
fn local_config() -> ProxyConfig {
    ProxyConfig {
        backends: (1..=3)
            .map(|i| BackendConfig::new(format!("backend-{i}"), format!("localhost:{}", 3000 + i)))
            .collect(),
        ..ProxyConfig::default()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => local_config(),
    };

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "caching-balancer starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        cache_enabled = config.cache.enabled,
        rate_limit_enabled = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    HttpServer::new(config).run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
