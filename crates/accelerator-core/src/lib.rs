//! # Accelerator Core
//!
//! Core library for the SEDA Cosmos Accelerator, a caching reverse proxy in front of a
//! Tendermint / Cosmos SDK RPC node.
//!
//! - **[`chain`]**: the upstream block [`Height`](chain::Height), either unknown or a
//!   concrete arbitrary-precision value.
//!
//! - **[`cache`]**: [`HeightCache`](cache::HeightCache), `abci_query` responses valid only
//!   for the height they were fetched at, cleared wholesale when the height advances or
//!   is lost.
//!
//! - **[`proxy`]**: per-request classification and the [`ProxyEngine`](proxy::ProxyEngine)
//!   that serves cache hits and forwards everything else verbatim.
//!
//! - **[`upstream`]**: the shared HTTP client, the height poller and the sync-status probe.
//!
//! - **[`config`]**: layered application configuration.
//!
//! ## Request Flow
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌──────────────┐
//! │   classify   │ ─── not abci_query ──► forward verbatim
//! └──────┬───────┘
//!        │ cacheable
//!        ▼
//! ┌──────────────┐
//! │ Cache Check  │ ─── Hit ──► cached result, caller's id
//! └──────┬───────┘
//!        │ Miss (epoch snapshot)
//!        ▼
//! ┌──────────────┐
//! │   Upstream   │ ─── non-2xx / not JSON-RPC ──► forward, no insert
//! └──────┬───────┘
//!        │
//!        ▼
//! ┌──────────────┐
//! │ Cache Insert │ (dropped if the height moved meanwhile)
//! └──────┬───────┘
//!        ▼
//!   Upstream response, unmodified
//! ```
//!
//! Independently, [`HeightPoller`](upstream::HeightPoller) fetches `/blockchain` on a
//! timer and feeds the result into the cache.

pub mod cache;
pub mod chain;
pub mod config;
pub mod proxy;
pub mod types;
pub mod upstream;
