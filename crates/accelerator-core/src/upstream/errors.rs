use thiserror::Error;

/// Errors that can occur when talking to the upstream Tendermint RPC node.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Request exceeded the configured timeout duration.
    #[error("Request timeout")]
    Timeout,

    /// Failed to establish a connection to the upstream endpoint.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// HTTP-level error occurred (non-2xx status code).
    ///
    /// First field is the HTTP status code, second is a truncated body.
    #[error("HTTP error: {0}")]
    HttpError(u16, String),

    /// Response body did not match the expected schema.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured upstream address could not be turned into a URL.
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

impl UpstreamError {
    /// Returns `true` if the error means the upstream could not be reached at all,
    /// as opposed to answering with something unusable.
    #[must_use]
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Timeout | Self::ConnectionFailed(_))
    }
}
