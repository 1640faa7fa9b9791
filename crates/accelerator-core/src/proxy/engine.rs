//! Proxy decision for a single buffered request.
//!
//! Cacheable `abci_query` calls are looked up in the shared [`HeightCache`]; a miss
//! is forwarded and its answer stored only if the height is still the one seen when
//! the request started. Everything else goes straight to the upstream.

use bytes::Bytes;
use std::sync::Arc;

use crate::{cache::HeightCache, types::CacheEntry, upstream::UpstreamClient};

use super::{
    classify::{classify, CacheableQuery, Classification},
    errors::ProxyError,
    request::{CacheStatus, ProxyRequest, ProxyResponse},
};

/// Per-request proxy decision: answer `abci_query` from the cache when possible,
/// otherwise forward the request verbatim.
///
/// Upstream responses are never rewritten. A cache hit is the only response built
/// locally.
pub struct ProxyEngine {
    client: UpstreamClient,
    cache: Arc<HeightCache>,
    caching_enabled: bool,
}

impl ProxyEngine {
    #[must_use]
    pub fn new(client: UpstreamClient, cache: Arc<HeightCache>) -> Self {
        Self { client, cache, caching_enabled: true }
    }

    /// Turns the engine into a pure passthrough when `enabled` is `false`.
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<HeightCache> {
        &self.cache
    }

    /// Handles one buffered request.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Upstream`] when the upstream could not be reached, and
    /// [`ProxyError::Internal`] if a cached entry cannot be re-encoded.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ProxyResponse, ProxyError> {
        if !self.caching_enabled {
            return self.forward(&request, CacheStatus::Bypass).await;
        }

        match classify(&request.body) {
            Classification::Passthrough(reason) => {
                tracing::debug!(%reason, "skipping cache");
                self.forward(&request, CacheStatus::Bypass).await
            }
            Classification::Cacheable(query) => self.handle_cacheable(&request, query).await,
        }
    }

    async fn handle_cacheable(
        &self,
        request: &ProxyRequest,
        query: CacheableQuery,
    ) -> Result<ProxyResponse, ProxyError> {
        if let Some(entry) = self.cache.get(&query.key) {
            tracing::debug!("cache hit");
            let body = entry.to_response_body(&query.id).map_err(|e| {
                ProxyError::Internal(format!("failed to encode cached response: {e}"))
            })?;
            return Ok(ProxyResponse::cached(Bytes::from(body)));
        }

        tracing::debug!("cache miss, fetching from upstream");
        // Snapshot before the upstream call; a height change while it is in flight
        // makes the answer stale for the new epoch.
        let epoch = self.cache.epoch();
        let response = self.forward(request, CacheStatus::Miss).await?;

        if !response.status.is_success() {
            tracing::debug!(
                status = response.status.as_u16(),
                "upstream returned non-success, not caching"
            );
            return Ok(response);
        }

        match CacheEntry::from_slice(&response.body) {
            Some(entry) => {
                if self.cache.set_if_epoch(&epoch, query.key, entry) {
                    tracing::trace!(%epoch, "response cached");
                }
            }
            None => tracing::warn!("upstream response is not a JSON-RPC result, not caching"),
        }

        Ok(response)
    }

    async fn forward(
        &self,
        request: &ProxyRequest,
        cache_status: CacheStatus,
    ) -> Result<ProxyResponse, ProxyError> {
        self.client.send(request, cache_status).await.map_err(|e| {
            tracing::warn!(error = %e, "upstream request failed");
            ProxyError::Upstream(e)
        })
    }
}
