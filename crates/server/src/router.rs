use accelerator_core::{
    proxy::{ProxyEngine, ProxyError, ProxyRequest, ProxyResponse},
    upstream::{StatusProbe, SyncStatus},
};
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http_body_util::LengthLimitError;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info_span, warn, Instrument};

use crate::middleware::{create_request_id_layers, CorrelationId};

pub const IS_SYNCED_PATH: &str = "/is-synced";

/// Shared state for every route.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ProxyEngine>,
    pub probe: StatusProbe,
    pub max_body_bytes: usize,
}

/// Builds the public router: `GET /is-synced` plus a catch-all proxy.
///
/// Other methods on `/is-synced` are proxied like any other path.
pub fn create_router(state: AppState) -> Router {
    let (set_request_id, propagate_request_id) = create_request_id_layers();
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route(IS_SYNCED_PATH, get(handle_is_synced).fallback(handle_proxy))
        .fallback(handle_proxy)
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        // Layers are applied in reverse order, so propagate runs after set
        .layer(propagate_request_id)
        .layer(set_request_id)
}

/// Reports whether the upstream node has caught up with the network.
///
/// `200` when synced, `503` while catching up (the upstream is the unready party),
/// `502` when the status cannot be retrieved. Never cached.
pub async fn handle_is_synced(State(state): State<AppState>, request: Request) -> Response {
    let request_id = CorrelationId::from_headers(request.headers());
    let span = info_span!("request", request_id = %request_id, route = "is_synced");

    async move {
        debug!("checking upstream sync status");
        match state.probe.check().await {
            Ok(SyncStatus::Synced) => StatusCode::OK.into_response(),
            Ok(SyncStatus::CatchingUp) => {
                debug!("upstream is catching up");
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
            Err(e) => {
                error!(error = %e, "failed to retrieve RPC status");
                (StatusCode::BAD_GATEWAY, "Failed to retrieve RPC status").into_response()
            }
        }
    }
    .instrument(span)
    .await
}

/// Forwards any request to the upstream, serving `abci_query` from the cache when
/// the current height allows.
pub async fn handle_proxy(State(state): State<AppState>, request: Request) -> Response {
    let request_id = CorrelationId::from_headers(request.headers());
    let span = info_span!(
        "request",
        request_id = %request_id,
        route = "proxy",
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let request = match buffer_request(request, state.max_body_bytes).await {
            Ok(request) => request,
            Err(e) => return proxy_error_response(&e),
        };

        match state.engine.handle(request).await {
            Ok(response) => {
                debug!(
                    status = response.status.as_u16(),
                    cache = %response.cache_status,
                    "returning response"
                );
                into_axum_response(response)
            }
            Err(e) => proxy_error_response(&e),
        }
    }
    .instrument(span)
    .await
}

async fn buffer_request(request: Request, limit: usize) -> Result<ProxyRequest, ProxyError> {
    let (parts, body) = request.into_parts();

    let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
        warn!(error = %e, limit, "failed to read request body");
        if exceeds_length_limit(&e) {
            ProxyError::BodyTooLarge { limit }
        } else {
            ProxyError::InvalidBody(e.to_string())
        }
    })?;

    Ok(ProxyRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    })
}

/// The limit can trip in `to_bytes` itself or in `RequestBodyLimitLayer`, which
/// nests the error one level deeper.
fn exceeds_length_limit(error: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = std::error::Error::source(err);
    }
    false
}

fn into_axum_response(response: ProxyResponse) -> Response {
    let ProxyResponse { status, headers, body, .. } = response;
    let mut out = Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

/// Maps proxy failures to short plain-text responses.
#[must_use]
pub fn proxy_error_response(error: &ProxyError) -> Response {
    let (status, message) = match error {
        ProxyError::BodyTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, error.to_string()),
        ProxyError::InvalidBody(_) => (StatusCode::BAD_REQUEST, error.to_string()),
        ProxyError::Upstream(_) if error.is_timeout() => {
            (StatusCode::GATEWAY_TIMEOUT, "Upstream request timed out".to_string())
        }
        ProxyError::Upstream(e) => (StatusCode::BAD_GATEWAY, format!("Upstream unavailable: {e}")),
        ProxyError::Internal(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    };

    if status.is_server_error() {
        error!(error = %error, status = status.as_u16(), "proxy request failed");
    }

    (status, message).into_response()
}
