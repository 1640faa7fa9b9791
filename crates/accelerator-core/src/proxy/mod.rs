//! Request classification and the caching proxy decision.

pub mod classify;
pub mod engine;
pub mod errors;
pub mod request;

pub use classify::{classify, CacheableQuery, Classification, PassthroughReason};
pub use engine::ProxyEngine;
pub use errors::ProxyError;
pub use request::{CacheStatus, ProxyRequest, ProxyResponse, X_CACHE_STATUS};
