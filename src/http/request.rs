//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Rewrite the request for forwarding to a backend
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing and forwarded upstream
//! - Method, path, query, body and end-to-end headers pass through untouched

use axum::body::Body;
use axum::http::{header, uri::Scheme, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::ProxyError;
use crate::load_balancer::Backend;
use crate::security::headers::end_to_end_headers;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()?;
        Some(RequestId::new(id))
    }
}

/// Turn a client request into a request for `backend`.
///
/// The body is moved, not buffered. With `rewrite_host` the Host header
/// names the backend; otherwise the client's Host is kept.
pub fn upstream_request(
    request: Request<Body>,
    backend: &Backend,
    rewrite_host: bool,
) -> Result<Request<Body>, ProxyError> {
    let (parts, body) = request.into_parts();
    let authority = backend.authority();

    let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let uri = Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority.as_str())
        .path_and_query(path)
        .build()?;

    let mut builder = Request::builder().method(parts.method).uri(uri);
    for (name, value) in end_to_end_headers(&parts.headers) {
        if rewrite_host && name == header::HOST {
            continue;
        }
        builder = builder.header(name, value);
    }

    if rewrite_host {
        builder = builder.header(header::HOST, authority.as_str());
    } else if !parts.headers.contains_key(header::HOST) {
        // HTTP/2 clients carry the host in the URI instead
        if let Some(original) = parts.uri.authority() {
            builder = builder.header(header::HOST, original.as_str());
        }
    }

    Ok(builder.body(body)?)
}
