//! `abci_query` response caching.
//!
//! - [`HeightCache`]: the shared cache whose validity is bound to the upstream height.
//! - [`CacheKey`]: canonical key derived from a request's `params`.

pub mod height_cache;
pub mod key;

pub use height_cache::{CacheStats, HeightCache};
pub use key::CacheKey;
