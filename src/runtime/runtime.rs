//! The composition root.
//!
//! A [`Runtime`] owns everything that would otherwise be a process global:
//! the startup task list, the cache registry and the readiness flag.
//! Components get caches from it by reference; nothing is ambient.
//!
//! ## Example Usage
//! ```rust,ignore
//! let runtime = RuntimeBuilder::new(settings, shutdown_rx).build();
//! let guilds = runtime.bind(guild_collection, Some(guild_feed))?;
//! runtime.start().await?;
//! assert!(guilds.is_initialized());
//! ```

use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing::warn;

use super::CacheRegistry;
use crate::CacheSynchronizer;
use crate::ChangeFeedWatcher;
use crate::ChangeStreamSource;
use crate::Collection;
use crate::Document;
use crate::LiveFeedStrategy;
use crate::PollingStrategy;
use crate::ReactiveMap;
use crate::Result;
use crate::Settings;
use crate::StartupCoordinator;
use crate::StartupHandle;
use crate::SyncMode;
use crate::SyncStrategy;

pub struct Runtime {
    pub(super) settings: Arc<Settings>,
    pub(super) coordinator: StartupCoordinator,
    pub(super) registry: CacheRegistry,
    pub(super) shutdown_signal: watch::Receiver<()>,
    pub(super) ready: AtomicBool,
}

impl Runtime {
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub fn coordinator(&self) -> &StartupCoordinator {
        &self.coordinator
    }

    /// Mirrors `collection` into a new shared cache.
    ///
    /// The strategy is chosen here from `cache.mode`. Live mode without a
    /// `feed` falls back to polling. A zero poll interval is rejected with
    /// `Error::InvalidConfig`. The cache is populated when
    /// [`start`](Self::start) runs.
    pub fn bind<T: Document>(
        &self,
        collection: Arc<dyn Collection<T>>,
        feed: Option<Arc<dyn ChangeStreamSource<T>>>,
    ) -> Result<Arc<ReactiveMap<T>>> {
        let name = collection.name();
        let strategy = self.select_strategy(&name, feed)?;
        let map = Arc::new(ReactiveMap::new(name.clone()));
        self.registry.register(map.clone())?;

        let synchronizer = Arc::new(CacheSynchronizer::new(map.clone(), collection, strategy));
        info!(
            collection = %name,
            strategy = synchronizer.strategy_name(),
            "cache bound"
        );
        synchronizer.register(&self.coordinator)?;

        Ok(map)
    }

    /// Standalone watcher for components that consume change events
    /// directly.
    ///
    /// In polling mode the watcher is disabled: it is ready immediately and
    /// never emits. In live mode it is opened by a startup task.
    pub fn watch<T: Document>(
        &self,
        feed: Arc<dyn ChangeStreamSource<T>>,
    ) -> Result<Arc<ChangeFeedWatcher<T>>> {
        if self.settings.cache.mode != SyncMode::Live {
            return Ok(Arc::new(ChangeFeedWatcher::disabled(feed.collection())));
        }

        let watcher = Arc::new(ChangeFeedWatcher::new(feed));
        let task_watcher = watcher.clone();
        let shutdown_signal = self.shutdown_signal.clone();
        self.coordinator.try_add_startup_task(
            format!("watch:{}", watcher.collection()),
            move || async move { task_watcher.open(Some(shutdown_signal)).await },
        )?;
        Ok(watcher)
    }

    /// Registers an arbitrary startup task.
    ///
    /// # Panics
    /// Panics if the runtime has already started.
    pub fn add_startup_task<F, Fut, R>(
        &self,
        name: impl Into<String>,
        task: F,
    ) -> StartupHandle<R>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
        R: Send + Sync + 'static,
    {
        self.coordinator.add_startup_task(name, task)
    }

    /// Cache previously bound under `name`
    pub fn cache<T: Document>(
        &self,
        name: &str,
    ) -> Result<Option<Arc<ReactiveMap<T>>>> {
        self.registry.get(name)
    }

    /// Runs all startup tasks, then reports ready.
    pub async fn start(&self) -> Result<()> {
        self.coordinator.run_all().await?;
        self.set_ready(true);
        info!(caches = self.registry.len(), "runtime ready");
        Ok(())
    }

    pub fn set_ready(
        &self,
        is_ready: bool,
    ) {
        self.ready.store(is_ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn select_strategy<T: Document>(
        &self,
        name: &str,
        feed: Option<Arc<dyn ChangeStreamSource<T>>>,
    ) -> Result<Box<dyn SyncStrategy<T>>> {
        let shutdown_signal = Some(self.shutdown_signal.clone());
        let strategy: Box<dyn SyncStrategy<T>> = match (self.settings.cache.mode, feed) {
            (SyncMode::Live, Some(feed)) => {
                let watcher = Arc::new(ChangeFeedWatcher::new(feed));
                Box::new(LiveFeedStrategy::new(watcher, shutdown_signal))
            }
            (SyncMode::Live, None) => {
                warn!(collection = %name, "live mode without change feed, falling back to polling");
                Box::new(PollingStrategy::new(
                    self.settings.cache.poll_interval(),
                    shutdown_signal,
                )?)
            }
            (SyncMode::Polling, _) => Box::new(PollingStrategy::new(
                self.settings.cache.poll_interval(),
                shutdown_signal,
            )?),
        };
        Ok(strategy)
    }
}
