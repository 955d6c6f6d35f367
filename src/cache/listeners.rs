//! Synchronous observer list with per-listener panic isolation.

use std::any::Any;
use std::fmt;
use std::panic::catch_unwind;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

use crate::metrics::LISTENER_PANICS_TOTAL;

pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Returned by `subscribe`, used to unsubscribe later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Listeners<E: ?Sized> {
    /// Used as the `collection` label when a listener panics
    label: String,
    next_id: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Listener<E>)>>,
}

impl<E: ?Sized> fmt::Debug for Listeners<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("label", &self.label)
            .field("len", &self.len())
            .finish()
    }
}

impl<E: ?Sized> Listeners<E> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(
        &self,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, Arc::new(listener)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(
        &self,
        id: ListenerId,
    ) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener in subscription order and returns how many panicked.
    ///
    /// The list is snapshotted before the first call, so listeners may
    /// subscribe or unsubscribe from inside a callback.
    pub fn emit(
        &self,
        event: &E,
    ) -> usize {
        let snapshot: Vec<Listener<E>> =
            self.entries.read().iter().map(|(_, l)| l.clone()).collect();

        let mut panicked = 0;
        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                panicked += 1;
                LISTENER_PANICS_TOTAL
                    .with_label_values(&[self.label.as_str()])
                    .inc();
                error!(
                    collection = %self.label,
                    "listener panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
        panicked
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
