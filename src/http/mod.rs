//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, secure headers)
//!     → security::rate_limit (429 on excess)
//!     → pipeline.rs (cache lookup, backend selection, forwarding)
//!     → request.rs (build the upstream request)
//!     → response.rs (tee the backend body to client and cache)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{TeeBody, X_CACHE};
pub use server::{AppState, HttpServer};
