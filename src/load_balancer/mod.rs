//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Cache miss in the forwarding pipeline
//!     → pool.rs (list_active: healthy backends in configuration order)
//!     → round_robin.rs (rotate through the active subset)
//!     → backend.rs (address of the chosen server)
//!     → Return backend or NoBackendsAvailable
//! ```
//!
//! # Design Decisions
//! - The active subset is recomputed on every selection
//! - Only the health checker changes backend status
//! - The selection algorithm sits behind the `LoadBalancer` trait

use std::sync::Arc;

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::Backend;
pub use pool::BackendPool;
pub use round_robin::RoundRobin;

/// Strategy for picking one backend out of the currently active set.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// `backends` contains only active backends. Returns `None` when empty.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
