//! JSON-RPC shapes shared by the cache and the proxy.
//!
//! Only the parts of JSON-RPC the accelerator inspects are modelled. Requests are
//! never rebuilt: the original body is forwarded byte for byte, so request fields
//! are read from a loosely parsed [`serde_json::Value`].

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// JSON-RPC method whose responses may be cached.
pub const ABCI_QUERY_METHOD: &str = "abci_query";

/// Literal marker a request body must contain before it is parsed for caching.
///
/// Matches the compact encoding produced by Cosmos SDK and CosmJS clients. Bodies
/// that spell the method with extra whitespace are forwarded uncached.
pub const ABCI_QUERY_MARKER: &str = r#""method":"abci_query""#;

/// A successful upstream JSON-RPC response as stored in the cache.
///
/// Unknown fields in the upstream payload are dropped during deserialization, and a
/// response without `result` (e.g. a JSON-RPC error object) does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub jsonrpc: String,
    pub id: Number,
    pub result: Value,
}

impl CacheEntry {
    /// Parses an upstream body into a cacheable entry.
    ///
    /// Returns `None` if the body is not JSON or does not have the
    /// `{jsonrpc: string, id: number, result: any}` shape.
    #[must_use]
    pub fn from_slice(body: &[u8]) -> Option<Self> {
        serde_json::from_slice(body).ok()
    }

    /// Serializes the entry with its `id` replaced by the caller's request id.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the entry contains a value serde_json
    /// cannot encode, which does not happen for values it decoded itself.
    pub fn to_response_body(&self, request_id: &Value) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&CachedResponse {
            jsonrpc: &self.jsonrpc,
            id: request_id,
            result: &self.result,
        })
    }
}

/// Borrowed view used to serialize a cache hit without cloning the result.
#[derive(Serialize)]
struct CachedResponse<'a> {
    jsonrpc: &'a str,
    id: &'a Value,
    result: &'a Value,
}
