//! In-memory response cache with TTL expiry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::CacheConfig;
use crate::observability::metrics;

/// Build the cache key for a request: `METHOD:PATH`, query string included.
pub fn cache_key(method: &Method, uri: &Uri) -> String {
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    format!("{}:{}", method, path)
}

/// A captured backend response.
#[derive(Debug)]
pub struct CacheEntry {
    pub key: String,
    pub status: StatusCode,
    /// Response headers in arrival order; repeated names are kept.
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Bytes,
    pub expires_at: Instant,
}

impl CacheEntry {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// A thread-safe response cache.
#[derive(Debug)]
pub struct CacheStore {
    entries: DashMap<String, Arc<CacheEntry>>,
    ttl: Duration,
    max_body_bytes: usize,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_limits(config.ttl(), config.max_body_bytes)
    }

    pub fn with_limits(ttl: Duration, max_body_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_body_bytes,
        }
    }

    /// TTL applied by the forwarding pipeline.
    pub fn default_ttl(&self) -> Duration {
        self.ttl
    }

    /// Largest body the store accepts.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Return the live entry for `key`, if any.
    ///
    /// An expired entry is never returned, whether or not the sweeper has
    /// removed it yet.
    pub fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.lookup_at(key, Instant::now())
    }

    fn lookup_at(&self, key: &str, now: Instant) -> Option<Arc<CacheEntry>> {
        // the read guard must be released before remove_if takes the write lock
        let found = self.entries.get(key).map(|e| e.value().clone())?;
        if !found.is_expired_at(now) {
            return Some(found);
        }
        if self.entries.remove_if(key, |_, e| e.is_expired_at(now)).is_some() {
            metrics::record_cache_size(self.entries.len());
        }
        None
    }

    /// Store a response. Returns false when the response is not cacheable
    /// (non-200 status or oversized body).
    pub fn store(
        &self,
        key: String,
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
        body: Bytes,
        ttl: Duration,
    ) -> bool {
        if status != StatusCode::OK || body.len() > self.max_body_bytes {
            return false;
        }

        let entry = Arc::new(CacheEntry {
            key: key.clone(),
            status,
            headers,
            body,
            expires_at: Instant::now() + ttl,
        });
        self.entries.insert(key, entry);
        metrics::record_cache_size(self.entries.len());
        true
    }

    /// Remove every expired entry. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_expired_at(now));
        let evicted = before.saturating_sub(self.entries.len());
        metrics::record_cache_size(self.entries.len());
        evicted
    }

    /// Number of entries held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically evict expired entries until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = self.sweep();
                    if evicted > 0 {
                        tracing::debug!(evicted, remaining = self.len(), "Swept expired cache entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache sweeper stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> CacheStore {
        CacheStore::with_limits(Duration::from_secs(20), 1024)
    }

    fn headers() -> Vec<(HeaderName, HeaderValue)> {
        vec![
            (HeaderName::from_static("content-type"), HeaderValue::from_static("text/plain")),
            (HeaderName::from_static("set-cookie"), HeaderValue::from_static("a=1")),
            (HeaderName::from_static("set-cookie"), HeaderValue::from_static("b=2")),
        ]
    }

    #[test]
    fn test_cache_key() {
        let uri: Uri = "http://localhost:8080/todos/1?full=true".parse().unwrap();
        assert_eq!(cache_key(&Method::GET, &uri), "GET:/todos/1?full=true");

        let uri: Uri = "/".parse().unwrap();
        assert_eq!(cache_key(&Method::POST, &uri), "POST:/");
    }

    #[test]
    fn test_store_and_lookup() {
        let cache = store();
        assert!(cache.lookup("GET:/a").is_none());

        assert!(cache.store(
            "GET:/a".into(),
            StatusCode::OK,
            headers(),
            Bytes::from_static(b"hello"),
            cache.default_ttl(),
        ));

        let entry = cache.lookup("GET:/a").unwrap();
        assert_eq!(entry.key, "GET:/a");
        assert_eq!(entry.status, StatusCode::OK);
        assert_eq!(entry.body, Bytes::from_static(b"hello"));
        // duplicates and order preserved
        assert_eq!(entry.headers.len(), 3);
        assert_eq!(entry.headers[2].1, "b=2");
    }

    #[test]
    fn test_only_ok_is_cached() {
        let cache = store();
        for status in [StatusCode::NOT_FOUND, StatusCode::INTERNAL_SERVER_ERROR, StatusCode::CREATED] {
            assert!(!cache.store("GET:/x".into(), status, Vec::new(), Bytes::new(), cache.default_ttl()));
        }
        assert!(cache.lookup("GET:/x").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_oversized_body_rejected() {
        let cache = store();
        let body = Bytes::from(vec![0u8; 1025]);
        assert!(!cache.store("GET:/big".into(), StatusCode::OK, Vec::new(), body, cache.default_ttl()));
        assert!(cache.lookup("GET:/big").is_none());
    }

    #[test]
    fn test_expired_entry_not_served() {
        let cache = store();
        cache.store("GET:/a".into(), StatusCode::OK, Vec::new(), Bytes::from_static(b"x"), Duration::from_secs(20));

        let later = Instant::now() + Duration::from_secs(21);
        assert!(cache.lookup_at("GET:/a", later).is_none());
        // lazily removed on read
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_lazy_removal_updates_entry_gauge() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let cache = store();

        ::metrics::with_local_recorder(&recorder, || {
            cache.store("GET:/a".into(), StatusCode::OK, Vec::new(), Bytes::from_static(b"x"), Duration::from_secs(20));
            assert!(handle.render().contains("proxy_cache_entries 1"));

            let later = Instant::now() + Duration::from_secs(21);
            assert!(cache.lookup_at("GET:/a", later).is_none());
        });

        assert!(handle.render().contains("proxy_cache_entries 0"));
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = store();
        cache.store("GET:/a".into(), StatusCode::OK, Vec::new(), Bytes::from_static(b"first"), cache.default_ttl());
        cache.store("GET:/a".into(), StatusCode::OK, Vec::new(), Bytes::from_static(b"second"), cache.default_ttl());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("GET:/a").unwrap().body, Bytes::from_static(b"second"));
    }

    #[test]
    fn test_sweep() {
        let cache = store();
        cache.store("GET:/short".into(), StatusCode::OK, Vec::new(), Bytes::new(), Duration::from_secs(1));
        cache.store("GET:/long".into(), StatusCode::OK, Vec::new(), Bytes::new(), Duration::from_secs(60));

        let evicted = cache.sweep_at(Instant::now() + Duration::from_secs(5));
        assert_eq!(evicted, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("GET:/long").is_some());
    }

    #[test]
    fn test_concurrent_stores() {
        let cache = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let body = Bytes::from(format!("writer-{i}"));
                        cache.store("GET:/race".into(), StatusCode::OK, Vec::new(), body, Duration::from_secs(20));
                        let entry = cache.lookup("GET:/race").unwrap();
                        assert!(entry.body.starts_with(b"writer-"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 1);
    }
}
