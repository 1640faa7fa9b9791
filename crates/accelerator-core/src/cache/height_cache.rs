//! Height-scoped response cache.
//!
//! # Invariants
//!
//! - Entries exist only while the height is `Known`. Any `Unknown` state empties the
//!   map, and while it lasts `get` always misses and `set` is ignored.
//! - All entries share one implicit epoch: the height they were written under. There
//!   is no per-entry expiry. The whole map is dropped whenever the height advances to
//!   a strictly greater value or becomes `Unknown`.
//! - Observations less than or equal to the current height change nothing.
//!
//! Height and entries live behind a single lock so a reader can never see a new
//! height paired with entries from the previous one.
//!
//! # Epoch-checked writes
//!
//! A proxied request may still be waiting on the upstream while the poller moves
//! the height forward. [`HeightCache::set_if_epoch`] takes the height snapshot from
//! when the request started (see [`HeightCache::epoch`]) and refuses the write if the
//! height has changed since, so an answer computed at block `N` is never served as
//! an answer for block `N + 1`.

use super::key::CacheKey;
use crate::{
    chain::{Height, HeightTransition},
    types::CacheEntry,
};
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Default)]
struct CacheState {
    height: Height,
    entries: HashMap<CacheKey, Arc<CacheEntry>>,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    rejected_inserts: AtomicU64,
    clears: AtomicU64,
}

/// Point-in-time view of cache activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub height: Height,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub rejected_inserts: u64,
    pub clears: u64,
}

/// Mapping from `params` key to a previously observed `abci_query` response, valid
/// only for the current upstream height.
///
/// One instance is shared (via `Arc`) between the height poller, which is the only
/// writer of the height, and the proxy engine, which is the only writer of entries.
#[derive(Debug, Default)]
pub struct HeightCache {
    state: RwLock<CacheState>,
    counters: CacheCounters,
}

impl HeightCache {
    /// Creates an empty cache with an `Unknown` height.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current height.
    #[must_use]
    pub fn height(&self) -> Height {
        self.state.read().height.clone()
    }

    /// Snapshot of the height to pass to [`Self::set_if_epoch`] later.
    #[must_use]
    pub fn epoch(&self) -> Height {
        self.height()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up a cached response. Always a miss while the height is `Unknown`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let state = self.state.read();

        if !state.height.is_known() {
            trace!(key = %key, "height unknown, skipping cache get");
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let entry = state.entries.get(key).cloned();
        if entry.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, height = %state.height, "cache hit");
        } else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, height = %state.height, "cache miss");
        }
        entry
    }

    /// Inserts or overwrites `key` under the current height.
    ///
    /// Returns `false` (and stores nothing) while the height is `Unknown`.
    pub fn set(&self, key: CacheKey, entry: CacheEntry) -> bool {
        let mut state = self.state.write();

        if !state.height.is_known() {
            trace!(key = %key, "height unknown, skipping cache set");
            self.counters.rejected_inserts.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        state.entries.insert(key, Arc::new(entry));
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Inserts `key` only if the height still equals `epoch`.
    ///
    /// Use this for responses whose upstream call started at `epoch`. If the height
    /// changed in between (advanced, lost, or became known) the write is dropped.
    pub fn set_if_epoch(&self, epoch: &Height, key: CacheKey, entry: CacheEntry) -> bool {
        let mut state = self.state.write();

        if !state.height.is_known() || state.height != *epoch {
            debug!(
                key = %key,
                epoch = %epoch,
                height = %state.height,
                "height changed during upstream call, discarding cache write"
            );
            self.counters.rejected_inserts.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        state.entries.insert(key, Arc::new(entry));
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Drops every entry. The height is left untouched.
    pub fn clear(&self) {
        let mut state = self.state.write();
        Self::clear_locked(&mut state, &self.counters);
    }

    /// Applies a height observation, clearing the cache if it is a transition.
    ///
    /// `Height::Unknown` stands for a failed observation: it always resets the height
    /// and empties the cache. A known observation that is not strictly greater than
    /// the current height is ignored.
    pub fn observe_height(&self, observed: Height) -> HeightTransition {
        let mut state = self.state.write();
        let transition = state.height.transition_to(&observed);

        match transition {
            HeightTransition::Unchanged => {
                trace!(
                    current = %state.height,
                    observed = %observed,
                    "height not greater than current, skipping update"
                );
                return transition;
            }
            HeightTransition::Established => {
                info!(height = %observed, "current height established");
            }
            HeightTransition::Advanced => {
                info!(
                    previous = %state.height,
                    height = %observed,
                    entries = state.entries.len(),
                    "height advanced, clearing cache"
                );
            }
            HeightTransition::Lost => {
                warn!(
                    previous = %state.height,
                    entries = state.entries.len(),
                    "height lost, resetting height and cache"
                );
            }
            HeightTransition::StillUnknown => {
                trace!("height still unknown");
            }
        }

        state.height = observed;
        Self::clear_locked(&mut state, &self.counters);
        transition
    }

    /// Returns current counters together with the height and entry count.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.state.read();
        CacheStats {
            height: state.height.clone(),
            entries: state.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            rejected_inserts: self.counters.rejected_inserts.load(Ordering::Relaxed),
            clears: self.counters.clears.load(Ordering::Relaxed),
        }
    }

    fn clear_locked(state: &mut CacheState, counters: &CacheCounters) {
        if state.entries.is_empty() {
            return;
        }
        let dropped = state.entries.len();
        state.entries.clear();
        counters.clears.fetch_add(1, Ordering::Relaxed);
        debug!(
            dropped,
            hits = counters.hits.load(Ordering::Relaxed),
            misses = counters.misses.load(Ordering::Relaxed),
            "cache cleared"
        );
    }
}
