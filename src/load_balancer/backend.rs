//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server (identity = host + port)
//! - Track up/down status and the time of the last transition
//! - Pre-compute the base URL used for probes and forwarded requests

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use url::Url;

/// Split a `host:port` address into its parts.
///
/// Accepts hostnames, IPv4 and bracketed IPv6 literals. A missing port
/// falls back to 80.
pub fn parse_address(address: &str) -> Option<(String, u16)> {
    let url = Url::parse(&format!("http://{}", address)).ok()?;
    if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
        return None;
    }
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    Some((host, port))
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Name from configuration, used in logs and metrics.
    pub name: String,
    pub host: String,
    pub port: u16,
    /// Pre-calculated base URL for performance.
    pub base_url: Url,

    up: AtomicBool,
    /// Milliseconds since the Unix epoch of the last up/down change.
    last_transition_ms: AtomicU64,
}

impl Backend {
    /// Create a new backend. Backends start up until a probe says otherwise.
    pub fn new(name: impl Into<String>, address: &str) -> Option<Self> {
        let (host, port) = parse_address(address)?;
        let base_url = Url::parse(&format!("http://{}:{}", host, port)).ok()?;
        Some(Self {
            name: name.into(),
            host,
            port,
            base_url,
            up: AtomicBool::new(true),
            last_transition_ms: AtomicU64::new(now_millis()),
        })
    }

    /// `host:port`, suitable for a URI authority or Host header.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }

    /// When the backend last changed state (or was created).
    pub fn last_transition(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.last_transition_ms.load(Ordering::Relaxed))
    }

    /// Set the status, returning true only if it actually changed.
    pub(crate) fn set_up(&self, up: bool) -> bool {
        let changed = self.up.swap(up, Ordering::AcqRel) != up;
        if changed {
            self.last_transition_ms.store(now_millis(), Ordering::Relaxed);
        }
        changed
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.name, self.host, self.port)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
