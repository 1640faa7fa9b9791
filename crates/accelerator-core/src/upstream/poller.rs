use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{
    cache::HeightCache,
    chain::{Height, HeightTransition},
    upstream::{queries::fetch_latest_height, UpstreamClient},
};

/// Result of a single poll attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A previous fetch was still outstanding; nothing was done.
    Skipped,
    /// A fetch completed (successfully or not) and was applied to the cache.
    Applied(HeightTransition),
}

/// RAII guard for the single-flight flag.
///
/// Only constructed by a successful `false -> true` swap, so dropping it always
/// releases a flag this guard owns, even if the fetch future is cancelled.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct PollerInner {
    client: UpstreamClient,
    cache: Arc<HeightCache>,
    in_flight: AtomicBool,
}

impl PollerInner {
    async fn poll_once(&self) -> PollOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            tracing::trace!("height fetch still in flight, skipping tick");
            return PollOutcome::Skipped;
        };

        let observed = match fetch_latest_height(&self.client).await {
            Ok(height) => height,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch latest height");
                Height::Unknown
            }
        };

        PollOutcome::Applied(self.cache.observe_height(observed))
    }
}

/// Periodically refreshes the upstream height and drives [`HeightCache`] invalidation.
///
/// At most one `/blockchain` fetch is outstanding at any time: a tick that finds a
/// fetch in progress is skipped, not queued. A failed fetch sets the height to
/// unknown, which empties the cache.
pub struct HeightPoller {
    inner: Arc<PollerInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HeightPoller {
    #[must_use]
    pub fn new(client: UpstreamClient, cache: Arc<HeightCache>) -> Self {
        Self {
            inner: Arc::new(PollerInner { client, cache, in_flight: AtomicBool::new(false) }),
            task: Mutex::new(None),
        }
    }

    /// Starts polling every `period`. The first fetch happens one period from now.
    ///
    /// Calling `start` while already running keeps the existing schedule.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, period: Duration) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            tracing::debug!("height poller already running");
            return;
        }

        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Dropped with this task on stop, which cancels any outstanding fetch.
            let mut fetches = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let inner = Arc::clone(&inner);
                        fetches.spawn(async move { inner.poll_once().await });
                    }
                    Some(_) = fetches.join_next(), if !fetches.is_empty() => {}
                }
            }
        }));

        tracing::info!(interval_ms = period.as_millis(), "height poller started");
    }

    /// Stops polling. No-op if the poller is not running.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().take() {
            handle.abort();
            tracing::info!("height poller stopped");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Runs one poll immediately, outside the timer schedule.
    ///
    /// Shares the single-flight guard with the scheduled ticks.
    pub async fn poll_once(&self) -> PollOutcome {
        self.inner.poll_once().await
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<HeightCache> {
        &self.inner.cache
    }
}

impl Drop for HeightPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.task.get_mut().take() {
            handle.abort();
        }
    }
}
