use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::{
    proxy::request::{
        strip_hop_by_hop, upstream_request_headers, CacheStatus, ProxyRequest, ProxyResponse,
    },
    upstream::UpstreamError,
};

/// Longest slice of an error body kept in [`UpstreamError::HttpError`].
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Timeouts for the shared upstream client.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Total time allowed for one upstream request, including the body.
    pub request_timeout: Duration,
    /// Time allowed to establish the TCP/TLS connection.
    pub connect_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self { request_timeout: Duration::from_secs(30), connect_timeout: Duration::from_secs(5) }
    }
}

/// Parses an upstream address, assuming `http://` when no scheme is given.
///
/// `localhost:26657` and `http://localhost:26657` resolve to the same URL.
///
/// # Errors
///
/// Returns [`UpstreamError::InvalidUrl`] for empty input, unparseable input, or a
/// scheme other than `http`/`https`.
pub fn parse_upstream_url(raw: &str) -> Result<Url, UpstreamError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UpstreamError::InvalidUrl("address is empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| UpstreamError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(UpstreamError::InvalidUrl(format!("{raw}: missing host"))),
        other => Err(UpstreamError::InvalidUrl(format!("{raw}: unsupported scheme {other}"))),
    }
}

/// The single outbound HTTP client shared by the proxy path, the poller and the
/// status probe.
///
/// Cloning is cheap; `reqwest::Client` is reference counted internally.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Builds a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to build.
    pub fn new(base_url: Url, config: &HttpClientConfig) -> Result<Self, UpstreamError> {
        let client = ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .use_rustls_tls()
            .redirect(reqwest::redirect::Policy::none())
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "failed to build http client");
                UpstreamError::ConnectionFailed(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client, base_url })
    }

    /// Sanitizes network errors so URLs and addresses do not leak into responses.
    fn sanitize_network_error(error: &reqwest::Error) -> String {
        if error.is_connect() {
            "connection refused or unreachable".to_string()
        } else if error.is_timeout() {
            "connection timed out".to_string()
        } else if error.is_request() {
            "request failed".to_string()
        } else if error.is_body() {
            "response body error".to_string()
        } else if error.is_decode() {
            "response decode error".to_string()
        } else {
            "network error".to_string()
        }
    }

    fn map_send_error(error: &reqwest::Error) -> UpstreamError {
        if error.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::ConnectionFailed(Self::sanitize_network_error(error))
        }
    }

    /// Resolves `path` (and an optional raw query) against the base URL.
    ///
    /// The base URL's own path is kept as a prefix, and request query parameters
    /// replace base parameters with the same name.
    #[must_use]
    pub fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.base_url.clone();

        let prefix = self.base_url.path().trim_end_matches('/');
        let suffix = path.trim_start_matches('/');
        url.set_path(&format!("{prefix}/{suffix}"));

        let mut pairs: Vec<(String, String)> =
            self.base_url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                pairs.retain(|(existing, _)| existing.as_str() != key.as_ref());
                pairs.push((key.into_owned(), value.into_owned()));
            }
        }

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(pairs.iter());
        }
        url
    }

    /// Issues `GET {base}/{path}` and decodes a 2xx JSON body into `T`.
    ///
    /// # Errors
    ///
    /// - [`UpstreamError::Timeout`] / [`UpstreamError::ConnectionFailed`] on transport failure
    /// - [`UpstreamError::HttpError`] for non-success status codes
    /// - [`UpstreamError::InvalidResponse`] when the body does not match `T`
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let url = self.target_url(path, None);

        let response =
            self.client.get(url).send().await.map_err(|e| Self::map_send_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let raw_text = response.text().await.unwrap_or_default();
            return Err(UpstreamError::HttpError(status.as_u16(), truncate(raw_text)));
        }

        let body = response.bytes().await.map_err(|e| Self::map_send_error(&e))?;
        serde_json::from_slice(&body).map_err(|e| UpstreamError::InvalidResponse(e.to_string()))
    }

    /// Forwards a proxied request verbatim and buffers the upstream response.
    ///
    /// Any status code, including 4xx/5xx and redirects, is returned as a
    /// [`ProxyResponse`]; only transport failures produce an error.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Timeout`] or [`UpstreamError::ConnectionFailed`] when
    /// the request could not be completed.
    pub async fn send(
        &self,
        request: &ProxyRequest,
        cache_status: CacheStatus,
    ) -> Result<ProxyResponse, UpstreamError> {
        let url = self.target_url(&request.path, request.query.as_deref());

        tracing::trace!(
            method = %request.method,
            path = %request.path,
            "forwarding request upstream"
        );

        let response = self
            .client
            .request(request.method.clone(), url)
            .headers(upstream_request_headers(&request.headers))
            // Bytes::clone is a refcount bump
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| Self::map_send_error(&e))?;

        let status: StatusCode = response.status();
        let mut headers = response.headers().clone();
        strip_hop_by_hop(&mut headers);

        let body = response.bytes().await.map_err(|e| Self::map_send_error(&e))?;

        Ok(ProxyResponse { status, headers, body, cache_status })
    }
}

fn truncate(raw_text: String) -> String {
    if raw_text.chars().count() > MAX_ERROR_BODY_CHARS {
        let cut: String = raw_text.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}... (truncated)")
    } else {
        raw_text
    }
}
