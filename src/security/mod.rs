//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-IP fixed window, 429 on excess)
//!     → headers.rs (strip hop-by-hop before forwarding)
//!     → Pass to the forwarding pipeline
//!
//! Outgoing response:
//!     → headers.rs (strip hop-by-hop, optional secure-mode headers)
//! ```

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{Admission, RateLimiter};
