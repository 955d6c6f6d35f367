use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::warn;

use crate::metrics::RELOADS_TOTAL;
use crate::ChangeEvent;
use crate::Collection;
use crate::CollectionError;
use crate::Document;
use crate::ReactiveMap;
use crate::Result;

/// Outcome of one full reload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReloadStats {
    pub inserted: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
}

impl ReloadStats {
    pub fn changed(&self) -> usize {
        self.inserted + self.updated + self.removed
    }
}

/// Live changes that arrive while a reload is in flight.
///
/// They are held back and replayed in arrival order once the diff has been
/// written, so a snapshot taken before a change never overwrites it.
struct LiveQueue<T: Document> {
    reloading: bool,
    pending: Vec<ChangeEvent<T>>,
}

/// One cache bound to one upstream collection.
///
/// This is the single writer of its map. Reloads are serialized, and live
/// changes are queued behind a running reload.
pub struct SyncBinding<T: Document> {
    map: Arc<ReactiveMap<T>>,
    collection: Arc<dyn Collection<T>>,
    reload_lock: Arc<tokio::sync::Mutex<()>>,
    live: Arc<Mutex<LiveQueue<T>>>,
}

impl<T: Document> Clone for SyncBinding<T> {
    fn clone(&self) -> Self {
        Self {
            map: self.map.clone(),
            collection: self.collection.clone(),
            reload_lock: self.reload_lock.clone(),
            live: self.live.clone(),
        }
    }
}

/// Replays queued live changes when the reload ends, including when the
/// reload future is dropped mid-fetch.
struct ReloadWindow<'a, T: Document> {
    binding: &'a SyncBinding<T>,
}

impl<'a, T: Document> ReloadWindow<'a, T> {
    fn begin(binding: &'a SyncBinding<T>) -> Self {
        binding.live.lock().reloading = true;
        Self { binding }
    }
}

impl<T: Document> Drop for ReloadWindow<'_, T> {
    fn drop(&mut self) {
        let mut live = self.binding.live.lock();
        let pending = std::mem::take(&mut live.pending);
        if !pending.is_empty() {
            debug!(
                collection = %self.binding.name(),
                replayed = pending.len(),
                "replaying changes received during reload"
            );
        }
        for event in &pending {
            self.binding.apply_now(event);
        }
        live.reloading = false;
    }
}

impl<T: Document> SyncBinding<T> {
    pub fn new(
        map: Arc<ReactiveMap<T>>,
        collection: Arc<dyn Collection<T>>,
    ) -> Self {
        Self {
            map,
            collection,
            reload_lock: Arc::new(tokio::sync::Mutex::new(())),
            live: Arc::new(Mutex::new(LiveQueue {
                reloading: false,
                pending: Vec::new(),
            })),
        }
    }

    pub fn map(&self) -> &Arc<ReactiveMap<T>> {
        &self.map
    }

    pub fn name(&self) -> &str {
        self.map.name()
    }

    /// Fetches the whole collection and diffs it into the map.
    ///
    /// Keys missing upstream are deleted; documents that are structurally
    /// equal to the cached version are left alone and emit nothing. Live
    /// changes received while this runs are applied after the diff.
    pub async fn reload(&self) -> Result<ReloadStats> {
        let _serialized = self.reload_lock.lock().await;
        let _window = ReloadWindow::begin(self);
        self.fetch_and_diff().await
    }

    async fn fetch_and_diff(&self) -> Result<ReloadStats> {
        let docs = match self.collection.find_all().await {
            Ok(docs) => docs,
            Err(e) => {
                RELOADS_TOTAL
                    .with_label_values(&[self.name(), "failure"])
                    .inc();
                return Err(CollectionError::FetchFailed {
                    collection: self.name().to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        let mut fetched: HashMap<String, T> = HashMap::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id().to_string();
            if fetched.insert(id.clone(), doc).is_some() {
                warn!(collection = %self.name(), id = %id, "duplicate id in fetch, keeping the last one");
            }
        }

        let mut stats = ReloadStats::default();
        for id in self.map.keys() {
            if !fetched.contains_key(&id) && self.map.delete(&id) {
                stats.removed += 1;
            }
        }

        for (id, doc) in fetched {
            match self.map.get(&id) {
                Some(cached) if *cached == doc => stats.unchanged += 1,
                Some(_) => {
                    self.map.set(id, doc);
                    stats.updated += 1;
                }
                None => {
                    self.map.set(id, doc);
                    stats.inserted += 1;
                }
            }
        }

        RELOADS_TOTAL
            .with_label_values(&[self.name(), "success"])
            .inc();
        debug!(
            collection = %self.name(),
            inserted = stats.inserted,
            updated = stats.updated,
            removed = stats.removed,
            unchanged = stats.unchanged,
            "reload finished"
        );
        Ok(stats)
    }

    /// Applies one live change.
    ///
    /// Updates without a post-image are skipped; the next reload reconciles
    /// them.
    pub fn apply(
        &self,
        event: &ChangeEvent<T>,
    ) {
        let mut live = self.live.lock();
        if live.reloading {
            live.pending.push(event.clone());
            return;
        }
        self.apply_now(event);
    }

    fn apply_now(
        &self,
        event: &ChangeEvent<T>,
    ) {
        match event {
            ChangeEvent::Insert { doc } => {
                self.map.set(doc.id(), doc.clone());
            }
            ChangeEvent::Update {
                id,
                full_doc: Some(doc),
                ..
            } => {
                self.map.set(id.as_str(), doc.clone());
            }
            ChangeEvent::Update { id, full_doc: None, .. } => {
                debug!(collection = %self.name(), id = %id, "update without post-image skipped");
            }
            ChangeEvent::Delete { id, .. } => {
                self.map.delete(id);
            }
        }
    }
}
