use std::sync::Arc;

use tracing::error;
use tracing::info;

use super::ReloadStats;
use super::SyncBinding;
use super::SyncStrategy;
use crate::Collection;
use crate::Document;
use crate::ReactiveMap;
use crate::Result;
use crate::StartupCoordinator;
use crate::StartupHandle;

/// Keeps one [`ReactiveMap`] eventually consistent with one collection.
///
/// Created before the process starts, activated once by a startup task,
/// then runs for the process lifetime.
pub struct CacheSynchronizer<T: Document> {
    binding: SyncBinding<T>,
    strategy: Box<dyn SyncStrategy<T>>,
}

impl<T: Document> CacheSynchronizer<T> {
    pub fn new(
        map: Arc<ReactiveMap<T>>,
        collection: Arc<dyn Collection<T>>,
        strategy: Box<dyn SyncStrategy<T>>,
    ) -> Self {
        Self {
            binding: SyncBinding::new(map, collection),
            strategy,
        }
    }

    pub fn map(&self) -> Arc<ReactiveMap<T>> {
        self.binding.map().clone()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Activates the strategy.
    ///
    /// If the first load fails, the map's `initialized()` fails with the
    /// same reason and the error is returned to the startup coordinator.
    pub async fn start(&self) -> Result<()> {
        info!(
            collection = %self.binding.name(),
            strategy = self.strategy.name(),
            "starting cache synchronizer"
        );
        match self.strategy.activate(self.binding.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(collection = %self.binding.name(), "cache initialization failed: {}", e);
                self.binding.map().fail_initialization(e.to_string());
                Err(e)
            }
        }
    }

    /// Runs one full reload outside the strategy's schedule.
    pub async fn reload(&self) -> Result<ReloadStats> {
        self.binding.reload().await
    }

    /// Registers `start` as a startup task named after the collection.
    pub fn register(
        self: Arc<Self>,
        coordinator: &StartupCoordinator,
    ) -> Result<StartupHandle<()>> {
        let name = format!("cache:{}", self.binding.name());
        coordinator.try_add_startup_task(name, move || async move { self.start().await })
    }
}
