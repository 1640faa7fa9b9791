//! Typed Tendermint RPC queries used by the poller and the status probe.

use serde::Deserialize;

use crate::{
    chain::Height,
    upstream::{UpstreamClient, UpstreamError},
};

pub const BLOCKCHAIN_PATH: &str = "/blockchain";
pub const STATUS_PATH: &str = "/status";

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct BlockchainResult {
    last_height: String,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    catching_up: bool,
}

/// Fetches `{result: {last_height}}` from `/blockchain` as a known [`Height`].
///
/// `last_height` must be a string of decimal digits.
///
/// # Errors
///
/// Transport and status failures from [`UpstreamClient::get_json`], or
/// [`UpstreamError::InvalidResponse`] if the payload or the height is malformed.
pub async fn fetch_latest_height(client: &UpstreamClient) -> Result<Height, UpstreamError> {
    let envelope: RpcEnvelope<BlockchainResult> = client.get_json(BLOCKCHAIN_PATH).await?;
    envelope
        .result
        .last_height
        .parse::<Height>()
        .map_err(|e| UpstreamError::InvalidResponse(format!("result.last_height: {e}")))
}

/// Fetches `result.sync_info.catching_up` from `/status`.
///
/// # Errors
///
/// Transport and status failures from [`UpstreamClient::get_json`], or
/// [`UpstreamError::InvalidResponse`] if the payload does not have the expected shape.
pub async fn fetch_catching_up(client: &UpstreamClient) -> Result<bool, UpstreamError> {
    let envelope: RpcEnvelope<StatusResult> = client.get_json(STATUS_PATH).await?;
    Ok(envelope.result.sync_info.catching_up)
}
