//! Response handling and transformation.
//!
//! # Responsibilities
//! - Rebuild a backend response for the client (hop-by-hop headers stripped)
//! - Tee the streamed body into the cache
//! - Replay cached entries with `X-Cache: HIT`
//!
//! # Design Decisions
//! - Streaming responses are never held back; the tee copies each chunk as
//!   it passes through
//! - The copy is capped; past the cap it is dropped and the response simply
//!   streams uncached
//! - A body that errors or is dropped early (client went away) is never stored

use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::{Bytes, BytesMut};
use http_body::{Frame, SizeHint};

use crate::cache::{CacheEntry, CacheStore};
use crate::http::request::X_REQUEST_ID;
use crate::security::headers::end_to_end_headers;

pub const X_CACHE: &str = "x-cache";

/// Pending cache write for a response that is still streaming.
struct Capture {
    cache: Arc<CacheStore>,
    key: String,
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    buffer: BytesMut,
    limit: usize,
}

impl Capture {
    fn commit(self) {
        let size = self.buffer.len();
        let ttl = self.cache.default_ttl();
        if self.cache.store(self.key.clone(), self.status, self.headers, self.buffer.freeze(), ttl) {
            tracing::debug!(key = %self.key, bytes = size, ttl = ?ttl, "Response cached");
        }
    }
}

/// Body wrapper that forwards every frame and keeps a bounded copy of the
/// data for the cache.
pub struct TeeBody<B> {
    inner: B,
    capture: Option<Capture>,
}

impl<B> TeeBody<B>
where
    B: http_body::Body<Data = Bytes>,
{
    /// Wrap `inner`, storing the full body under `key` once it completes.
    pub fn capturing(
        inner: B,
        cache: Arc<CacheStore>,
        key: String,
        status: StatusCode,
        headers: Vec<(HeaderName, HeaderValue)>,
    ) -> Self {
        let limit = cache.max_body_bytes();
        let hint = inner.size_hint();

        let mut tee = Self {
            inner,
            capture: None,
        };
        if hint.lower() > limit as u64 {
            tracing::debug!(key = %key, declared = hint.lower(), limit, "Body too large to cache");
            return tee;
        }

        let initial = hint.exact().unwrap_or(0).min(limit as u64) as usize;
        tee.capture = Some(Capture {
            cache,
            key,
            status,
            headers,
            buffer: BytesMut::with_capacity(initial),
            limit,
        });

        // empty bodies may never be polled
        if tee.inner.is_end_stream() {
            tee.finish();
        }
        tee
    }

    /// True while the body is still being copied for the cache.
    #[cfg(test)]
    fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn record(&mut self, chunk: &Bytes) {
        let Some(capture) = self.capture.as_mut() else {
            return;
        };
        if capture.buffer.len() + chunk.len() > capture.limit {
            self.abandon("body exceeds cache limit");
            return;
        }
        capture.buffer.extend_from_slice(chunk);
    }

    fn finish(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.commit();
        }
    }

    fn abandon(&mut self, reason: &'static str) {
        if let Some(capture) = self.capture.take() {
            tracing::debug!(key = %capture.key, reason, "Not caching response");
        }
    }
}

impl<B> http_body::Body for TeeBody<B>
where
    B: http_body::Body<Data = Bytes> + Unpin,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.record(data);
                }
                // hyper stops polling once the inner body reports its end
                if this.inner.is_end_stream() {
                    this.finish();
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                this.abandon("backend body error");
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Rebuild the client-facing header map from an ordered header list.
fn header_map(headers: &[(HeaderName, HeaderValue)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        map.append(name.clone(), value.clone());
    }
    map
}

/// Forward a backend response, teeing it into `cache` when given.
pub fn forward_response<B>(
    response: axum::http::Response<B>,
    cache: Option<(Arc<CacheStore>, String)>,
) -> Response
where
    B: http_body::Body<Data = Bytes> + Unpin + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    let (mut parts, body) = response.into_parts();
    let headers = end_to_end_headers(&parts.headers);
    parts.headers = header_map(&headers);

    let body = match cache {
        Some((store, key)) if parts.status == StatusCode::OK => {
            // request ids belong to one exchange; hits get the current one
            let stored = headers
                .into_iter()
                .filter(|(name, _)| name != X_REQUEST_ID)
                .collect();
            Body::new(TeeBody::capturing(body, store, key, parts.status, stored))
        }
        _ => Body::new(body),
    };
    Response::from_parts(parts, body)
}

/// Replay a cached entry.
pub fn cached_response(entry: &CacheEntry) -> Response {
    let mut response = Response::new(Body::from(entry.body.clone()));
    *response.status_mut() = entry.status;
    *response.headers_mut() = header_map(&entry.headers);
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static("HIT"));
    response
}
