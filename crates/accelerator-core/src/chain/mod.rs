//! Chain progress tracking.
//!
//! The accelerator only cares about one number from the upstream chain: the latest
//! block height. It is the epoch of the `abci_query` cache, so a cached answer is
//! reused only while the height it was produced at is still current.

pub mod height;

pub use height::{Height, HeightParseError, HeightTransition};
