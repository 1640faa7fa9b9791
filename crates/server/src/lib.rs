//! HTTP surface of the SEDA Cosmos Accelerator.
//!
//! The core logic lives in `accelerator_core`; this crate wires it into an axum
//! server: the `/is-synced` route, the catch-all proxy, request ids, logging, and
//! the `server` CLI.

pub mod app;
pub mod cli;
pub mod logging;
pub mod middleware;
pub mod router;

pub use app::Accelerator;
