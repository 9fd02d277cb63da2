//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer (fixed interval, first round immediately)
//!     → Probe every backend concurrently, each bounded by a timeout
//!     → 200 → BackendPool::mark_up, anything else → BackendPool::mark_down
//! ```
//!
//! # Design Decisions
//! - Backends start up; one failed probe takes a backend out of rotation
//!   and one successful probe puts it back
//! - Request failures do not change backend status; only probes do
//! - Probe failures never leave this module except as pool state and logs

pub mod active;

pub use active::{HealthMonitor, ProbeError};
