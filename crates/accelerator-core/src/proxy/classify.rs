//! Cache eligibility of inbound request bodies.

use serde_json::Value;
use std::fmt;

use crate::{cache::CacheKey, types::ABCI_QUERY_MARKER};

/// An `abci_query` request that may be answered from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheableQuery {
    pub key: CacheKey,
    /// The caller's JSON-RPC id, echoed back on a cache hit.
    pub id: Value,
}

/// Why a request is forwarded without touching the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassthroughReason {
    /// Empty body, or bytes that are not valid UTF-8.
    NotText,
    /// Body does not carry the `"method":"abci_query"` marker.
    NotAbciQuery,
    /// Marker present but the body is not a JSON object.
    InvalidJson,
    MissingParamsOrId,
}

impl fmt::Display for PassthroughReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotText => "body is not text",
            Self::NotAbciQuery => "not an abci_query",
            Self::InvalidJson => "body is not a JSON object",
            Self::MissingParamsOrId => "params or id missing",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Cacheable(CacheableQuery),
    Passthrough(PassthroughReason),
}

/// Decides whether `body` is a cacheable `abci_query` request.
///
/// The checks run cheapest first: UTF-8, then the literal marker, then a full
/// JSON parse. A `params` or `id` that is present but `null` still counts as present.
#[must_use]
pub fn classify(body: &[u8]) -> Classification {
    let text = match std::str::from_utf8(body) {
        Ok(text) if !text.is_empty() => text,
        _ => return Classification::Passthrough(PassthroughReason::NotText),
    };

    if !text.contains(ABCI_QUERY_MARKER) {
        return Classification::Passthrough(PassthroughReason::NotAbciQuery);
    }

    let Ok(Value::Object(mut request)) = serde_json::from_str::<Value>(text) else {
        return Classification::Passthrough(PassthroughReason::InvalidJson);
    };

    match (request.remove("params"), request.remove("id")) {
        (Some(params), Some(id)) => {
            Classification::Cacheable(CacheableQuery { key: CacheKey::from_params(&params), id })
        }
        _ => Classification::Passthrough(PassthroughReason::MissingParamsOrId),
    }
}
