use crate::upstream::{queries::fetch_catching_up, UpstreamClient, UpstreamError};

/// Sync state reported by the upstream node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Synced,
    CatchingUp,
}

impl SyncStatus {
    #[must_use]
    pub fn is_synced(&self) -> bool {
        matches!(self, Self::Synced)
    }
}

/// Stateless check of the upstream's `sync_info.catching_up` flag.
///
/// Every call goes to the upstream; results are never cached.
#[derive(Debug, Clone)]
pub struct StatusProbe {
    client: UpstreamClient,
}

impl StatusProbe {
    #[must_use]
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// Queries `/status` once.
    ///
    /// # Errors
    ///
    /// Any transport failure, non-success status, or malformed payload.
    pub async fn check(&self) -> Result<SyncStatus, UpstreamError> {
        let catching_up = fetch_catching_up(&self.client).await?;
        tracing::trace!(catching_up, "upstream sync status fetched");
        Ok(if catching_up { SyncStatus::CatchingUp } else { SyncStatus::Synced })
    }
}
