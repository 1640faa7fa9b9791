//! Transport-neutral request and response types for the proxy path.
//!
//! The server crate converts axum requests into [`ProxyRequest`] and turns
//! [`ProxyResponse`] back into an axum response. Both sides use the `http` crate
//! types re-exported by `reqwest`, so no conversion of methods, status codes, or
//! header maps is needed.

use bytes::Bytes;
use reqwest::{
    header::{self, HeaderMap, HeaderName},
    Method, StatusCode,
};
use std::fmt;

/// Headers that describe a single connection hop and must not be forwarded.
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Response header marking a reply served from the cache.
pub const X_CACHE_STATUS: HeaderName = HeaderName::from_static("x-cache-status");

/// An inbound request, buffered, ready to be classified and forwarded.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path relative to the proxy root, e.g. `/` or `/abci_query`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How a response was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache without contacting the upstream.
    Hit,
    /// Eligible for caching but fetched from the upstream.
    Miss,
    /// Not eligible for caching; forwarded verbatim.
    Bypass,
}

impl CacheStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Bypass => "BYPASS",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response to hand back to the client.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache_status: CacheStatus,
}

impl ProxyResponse {
    /// Builds the reply for a cache hit: `200`, JSON body, `x-cache-status: HIT`.
    #[must_use]
    pub fn cached(body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));
        headers.insert(X_CACHE_STATUS, header::HeaderValue::from_static(CacheStatus::Hit.as_str()));
        Self { status: StatusCode::OK, headers, body, cache_status: CacheStatus::Hit }
    }
}

/// Removes hop-by-hop headers and `content-length`; framing is recomputed per hop.
///
/// Headers named in `Connection` are hop-by-hop too (RFC 7230 section 6.1).
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
    headers.remove(header::CONTENT_LENGTH);
}

/// Prepares inbound headers for the upstream: hop-by-hop headers and `Host` removed.
#[must_use]
pub fn upstream_request_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    headers.remove(header::HOST);
    strip_hop_by_hop(&mut headers);
    headers
}
