use crate::upstream::errors::UpstreamError;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    /// The client body could not be read, e.g. the connection dropped mid-body.
    #[error("Failed to read request body: {0}")]
    InvalidBody(String),

    /// Preserves the concrete `UpstreamError` so the server can tell timeouts apart.
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Upstream(UpstreamError::Timeout))
    }
}
