//! Response caching subsystem.
//!
//! # Data Flow
//! ```text
//! Request → key "METHOD:PATH?QUERY"
//!     → store.rs lookup (expiry checked at read time)
//!     → hit: replay stored status, headers, body + X-Cache: HIT
//!     → miss: forward; http::response::TeeBody captures the body
//!       and calls store once the backend response completes
//!
//! Background:
//!     sweep task → evict expired entries to bound memory
//! ```
//!
//! # Design Decisions
//! - Only status 200 responses are cached
//! - One TTL for the whole store
//! - Entries are immutable and swapped in whole; last writer wins
//! - Request headers do not participate in the key (no Vary handling)

pub mod store;

pub use store::{cache_key, CacheEntry, CacheStore};
