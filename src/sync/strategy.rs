//! Synchronization strategies
//!
//! A strategy is picked once, when the binding is created, and owns the
//! whole lifecycle of its map: initial load, `mark_initialized`, and the
//! steady-state updates that follow.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::SyncBinding;
use crate::utils::async_task::spawn_task;
use crate::utils::async_task::wait_for_shutdown;
use crate::ChangeFeedWatcher;
use crate::ChangeKind;
use crate::Document;
use crate::Error;
use crate::Result;

#[async_trait]
pub trait SyncStrategy<T: Document>: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Performs the initial load and starts steady-state synchronization.
    ///
    /// Returns once the map is initialized. An error means the map never
    /// reached its first consistent state.
    async fn activate(
        &self,
        binding: SyncBinding<T>,
    ) -> Result<()>;
}

/// Applies change feed events and reconciles once the feed is ready
pub struct LiveFeedStrategy<T: Document> {
    watcher: Arc<ChangeFeedWatcher<T>>,
    shutdown_signal: Option<watch::Receiver<()>>,
}

impl<T: Document> LiveFeedStrategy<T> {
    pub fn new(
        watcher: Arc<ChangeFeedWatcher<T>>,
        shutdown_signal: Option<watch::Receiver<()>>,
    ) -> Self {
        Self {
            watcher,
            shutdown_signal,
        }
    }

    pub fn watcher(&self) -> &Arc<ChangeFeedWatcher<T>> {
        &self.watcher
    }
}

#[async_trait]
impl<T: Document> SyncStrategy<T> for LiveFeedStrategy<T> {
    fn name(&self) -> &'static str {
        "live"
    }

    async fn activate(
        &self,
        binding: SyncBinding<T>,
    ) -> Result<()> {
        // Listeners go in before the reload so no change made during the
        // reload window is lost.
        for kind in [ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete] {
            let binding = binding.clone();
            self.watcher.on(kind, move |event| binding.apply(event));
        }

        self.watcher.open(self.shutdown_signal.clone()).await?;
        self.watcher.initialized().await?;

        let stats = binding.reload().await?;
        binding.map().mark_initialized();
        info!(
            collection = %binding.name(),
            entries = binding.map().len(),
            changed = stats.changed(),
            "cache initialized from live feed"
        );
        Ok(())
    }
}

/// Re-fetches and diffs the whole collection on a fixed interval
pub struct PollingStrategy {
    period: Duration,
    shutdown_signal: Option<watch::Receiver<()>>,
}

impl PollingStrategy {
    /// Returns `Error::InvalidConfig` for a zero `period`.
    pub fn new(
        period: Duration,
        shutdown_signal: Option<watch::Receiver<()>>,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(Error::InvalidConfig("poll period must be greater than 0".into()));
        }
        Ok(Self {
            period,
            shutdown_signal,
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

#[async_trait]
impl<T: Document> SyncStrategy<T> for PollingStrategy {
    fn name(&self) -> &'static str {
        "polling"
    }

    async fn activate(
        &self,
        binding: SyncBinding<T>,
    ) -> Result<()> {
        binding.reload().await?;
        binding.map().mark_initialized();
        info!(
            collection = %binding.name(),
            entries = binding.map().len(),
            period_ms = self.period.as_millis() as u64,
            "cache initialized, polling"
        );

        let period = self.period;
        let mut shutdown_signal = self.shutdown_signal.clone();
        let task_name = format!("poll_{}", binding.name());
        spawn_task(&task_name, move || async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the initial load above
            // already covered it.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = wait_for_shutdown(&mut shutdown_signal) => {
                        debug!(collection = %binding.name(), "poll loop shutting down");
                        return Ok(());
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = binding.reload().await {
                            warn!(collection = %binding.name(), "poll cycle failed: {}", e);
                        }
                    }
                }
            }
        });

        Ok(())
    }
}
