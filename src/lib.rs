//! Caching round-robin load balancer.
//!
//! Forwards client HTTP requests to a static set of backends while tracking
//! backend health, caching successful responses and rate limiting clients.

pub mod admin;
pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod security;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
