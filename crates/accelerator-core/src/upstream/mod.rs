//! Communication with the upstream Tendermint RPC node.
//!
//! - [`UpstreamClient`]: the one shared `reqwest` client, used for verbatim request
//!   forwarding and for the typed queries below.
//! - [`queries`]: `/blockchain` (latest height) and `/status` (sync state).
//! - [`HeightPoller`]: timer-driven, single-flight height refresh that drives
//!   [`crate::cache::HeightCache`] invalidation.
//! - [`StatusProbe`]: uncached sync-status check behind `/is-synced`.

pub mod errors;
pub mod http_client;
pub mod poller;
pub mod queries;
pub mod status;

pub use errors::UpstreamError;
pub use http_client::{parse_upstream_url, HttpClientConfig, UpstreamClient};
pub use poller::{HeightPoller, PollOutcome};
pub use status::{StatusProbe, SyncStatus};
