//! Mutation-observable id → document table.
//!
//! Readers get synchronous, never-blocking snapshots. Writes are reserved to
//! the crate: the owning [`CacheSynchronizer`](crate::CacheSynchronizer) is
//! the only writer, which is what keeps emission order deterministic.
//!
//! Notifications are delivered synchronously from inside `set`/`delete`,
//! after the table lock has been released, so listeners may read the map.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::InitLatch;
use super::ListenerId;
use super::Listeners;
use crate::metrics::CACHE_ENTRIES;
use crate::Document;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapEvent {
    Add,
    Delete,
}

pub struct ReactiveMap<T: Document> {
    name: String,
    entries: RwLock<HashMap<String, Arc<T>>>,
    on_add: Listeners<T>,
    on_delete: Listeners<T>,
    init: InitLatch,
}

impl<T: Document> fmt::Debug for ReactiveMap<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ReactiveMap")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl<T: Document> ReactiveMap<T> {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            entries: RwLock::new(HashMap::new()),
            on_add: Listeners::new(name.clone()),
            on_delete: Listeners::new(name.clone()),
            init: InitLatch::new(),
            name,
        }
    }

    /// Name of the upstream collection this map mirrors
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<Arc<T>> {
        self.entries.read().get(id).cloned()
    }

    pub fn contains_key(
        &self,
        id: &str,
    ) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Arc<T>> {
        self.entries.read().values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Arc<T>)> {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn filter<F>(
        &self,
        predicate: F,
    ) -> Vec<Arc<T>>
    where
        F: Fn(&T) -> bool,
    {
        self.values().into_iter().filter(|doc| predicate(doc.as_ref())).collect()
    }

    pub fn map<R, F>(
        &self,
        f: F,
    ) -> Vec<R>
    where
        F: Fn(&T) -> R,
    {
        self.values().iter().map(|doc| f(doc.as_ref())).collect()
    }

    pub fn find<F>(
        &self,
        predicate: F,
    ) -> Option<Arc<T>>
    where
        F: Fn(&T) -> bool,
    {
        self.values().into_iter().find(|doc| predicate(doc.as_ref()))
    }

    /// Subscribes to `Add` or `Delete` notifications.
    pub fn on<F>(
        &self,
        event: MapEvent,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.listeners(event).subscribe(listener)
    }

    pub fn off(
        &self,
        event: MapEvent,
        id: ListenerId,
    ) -> bool {
        self.listeners(event).unsubscribe(id)
    }

    /// Resolves once the first full load has completed.
    ///
    /// Fails with [`Error::InitializationFailed`](crate::Error) if that
    /// load failed instead.
    pub async fn initialized(&self) -> Result<()> {
        self.init.wait().await
    }

    pub fn is_initialized(&self) -> bool {
        self.init.is_open()
    }

    /// Upserts `value` under `id`.
    ///
    /// Replacing a structurally different value emits `Delete(old)` then
    /// `Add(new)`. Setting an equal value emits nothing and returns false.
    pub(crate) fn set(
        &self,
        id: impl Into<String>,
        value: impl Into<Arc<T>>,
    ) -> bool {
        let id = id.into();
        let value = value.into();

        let (previous, len) = {
            let mut entries = self.entries.write();
            if let Some(existing) = entries.get(&id) {
                if Arc::ptr_eq(existing, &value) || **existing == *value {
                    return false;
                }
            }
            let previous = entries.insert(id.clone(), value.clone());
            (previous, entries.len())
        };
        CACHE_ENTRIES
            .with_label_values(&[self.name.as_str()])
            .set(len as i64);

        trace!(collection = %self.name, id = %id, replaced = previous.is_some(), "cache set");
        if let Some(old) = previous {
            self.on_delete.emit(&old);
        }
        self.on_add.emit(&value);
        true
    }

    /// Removes `id`, emitting `Delete(old)`. Absent keys emit nothing.
    pub(crate) fn delete(
        &self,
        id: &str,
    ) -> bool {
        let (removed, len) = {
            let mut entries = self.entries.write();
            let removed = entries.remove(id);
            (removed, entries.len())
        };

        match removed {
            Some(old) => {
                CACHE_ENTRIES
                    .with_label_values(&[self.name.as_str()])
                    .set(len as i64);
                trace!(collection = %self.name, id = %id, "cache delete");
                self.on_delete.emit(&old);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_initialized(&self) -> bool {
        self.init.open()
    }

    pub(crate) fn fail_initialization(
        &self,
        reason: impl Into<String>,
    ) -> bool {
        self.init.fail(reason)
    }

    fn listeners(
        &self,
        event: MapEvent,
    ) -> &Listeners<T> {
        match event {
            MapEvent::Add => &self.on_add,
            MapEvent::Delete => &self.on_delete,
        }
    }
}
