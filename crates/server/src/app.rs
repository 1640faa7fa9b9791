//! Service wiring and server lifecycle.

use accelerator_core::{
    cache::HeightCache,
    config::AppConfig,
    proxy::ProxyEngine,
    upstream::{HeightPoller, StatusProbe, SyncStatus, UpstreamClient, UpstreamError},
};
use axum::Router;
use std::{future::Future, sync::Arc};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::router::{create_router, AppState};

/// All long-lived components, built once from an [`AppConfig`].
///
/// The cache is shared by the poller (height and invalidation) and the engine
/// (entries); nothing else holds it.
pub struct Accelerator {
    config: AppConfig,
    cache: Arc<HeightCache>,
    poller: HeightPoller,
    probe: StatusProbe,
    engine: Arc<ProxyEngine>,
}

impl Accelerator {
    /// Builds the upstream client and every component on top of it.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream URL is invalid or the HTTP client cannot be built.
    pub fn new(config: AppConfig) -> Result<Self, UpstreamError> {
        let base_url = config.upstream_url().map_err(UpstreamError::InvalidUrl)?;
        let client = UpstreamClient::new(base_url, &config.http_client_config())?;

        let cache = Arc::new(HeightCache::new());
        let poller = HeightPoller::new(client.clone(), Arc::clone(&cache));
        let probe = StatusProbe::new(client.clone());
        let engine = Arc::new(
            ProxyEngine::new(client, Arc::clone(&cache)).with_caching(config.cache.enabled),
        );

        Ok(Self { config, cache, poller, probe, engine })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<HeightCache> {
        &self.cache
    }

    #[must_use]
    pub fn poller(&self) -> &HeightPoller {
        &self.poller
    }

    /// Probes the upstream once before accepting traffic.
    ///
    /// A node that is still catching up passes; only an unreachable or malformed
    /// status is an error.
    ///
    /// # Errors
    ///
    /// Returns the probe failure.
    pub async fn startup_check(&self) -> Result<SyncStatus, UpstreamError> {
        let status = self.probe.check().await?;
        info!(synced = status.is_synced(), "startup check succeeded");
        Ok(status)
    }

    #[must_use]
    pub fn router(&self) -> Router {
        create_router(AppState {
            engine: Arc::clone(&self.engine),
            probe: self.probe.clone(),
            max_body_bytes: self.config.server.max_body_bytes,
        })
    }

    /// Serves on `listener` until `shutdown` resolves.
    ///
    /// The height poller runs for exactly the lifetime of the server when caching is
    /// enabled.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the server.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.config.cache.enabled {
            self.poller.start(self.config.height_check_interval());
        } else {
            info!("cache disabled, forwarding all requests");
        }

        let result = axum::serve(listener, self.router()).with_graceful_shutdown(shutdown).await;

        self.poller.stop();
        debug!(stats = ?self.cache.stats(), "final cache stats");
        result
    }
}
