//! Change feed watcher
//!
//! ```text
//!   Disabled ──────────────────────────────────────────► ready latch open
//!
//!   Closed ──open()──► Replaying ──first ResumeTokenChanged──► Ready
//! ```
//!
//! While `Replaying`, events may be duplicates of history the upstream is
//! replaying; consumers must not treat them as complete until
//! [`initialized`](ChangeFeedWatcher::initialized) resolves. The watcher
//! never reconnects: a failed or ended stream leaves the state untouched and
//! a fresh watcher must be created to resubscribe. A stream that ends, or is
//! shut down, before its first resume token fails `initialized()`.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use super::ChangeEvent;
use super::ChangeKind;
use super::ChangeStream;
use super::ChangeStreamSource;
use super::StreamItem;
use super::WatchOptions;
use crate::cache::InitLatch;
use crate::cache::ListenerId;
use crate::cache::Listeners;
use crate::metrics::CHANGE_EVENTS_TOTAL;
use crate::utils::async_task::spawn_task;
use crate::utils::async_task::wait_for_shutdown;
use crate::Document;
use crate::Result;
use crate::WatcherError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Live feed unavailable in this environment; ready without subscribing
    Disabled,
    /// Not opened yet
    Closed,
    /// Subscription active, no resume token observed yet
    Replaying,
    /// Resume token observed at least once
    Ready,
}

pub struct ChangeFeedWatcher<T: Document> {
    collection: String,
    source: Option<Arc<dyn ChangeStreamSource<T>>>,
    options: WatchOptions,
    state: Mutex<WatcherState>,
    ready: InitLatch,
    on_open: Listeners<()>,
    on_insert: Listeners<ChangeEvent<T>>,
    on_update: Listeners<ChangeEvent<T>>,
    on_delete: Listeners<ChangeEvent<T>>,
}

impl<T: Document> fmt::Debug for ChangeFeedWatcher<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("ChangeFeedWatcher")
            .field("collection", &self.collection)
            .field("state", &self.state())
            .finish()
    }
}

impl<T: Document> ChangeFeedWatcher<T> {
    /// Watcher backed by a live change stream
    pub fn new(source: Arc<dyn ChangeStreamSource<T>>) -> Self {
        Self::build(source.collection(), Some(source), WatcherState::Closed)
    }

    /// No-op watcher for environments without a live feed.
    ///
    /// It is ready from construction and never emits change events.
    pub fn disabled(collection: impl Into<String>) -> Self {
        let watcher = Self::build(collection.into(), None, WatcherState::Disabled);
        watcher.ready.open();
        watcher
    }

    fn build(
        collection: String,
        source: Option<Arc<dyn ChangeStreamSource<T>>>,
        state: WatcherState,
    ) -> Self {
        Self {
            on_open: Listeners::new(collection.clone()),
            on_insert: Listeners::new(collection.clone()),
            on_update: Listeners::new(collection.clone()),
            on_delete: Listeners::new(collection.clone()),
            collection,
            source,
            options: WatchOptions::default(),
            state: Mutex::new(state),
            ready: InitLatch::new(),
        }
    }

    pub fn with_options(
        mut self,
        options: WatchOptions,
    ) -> Self {
        self.options = options;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn state(&self) -> WatcherState {
        *self.state.lock()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_open()
    }

    /// Resolves once the feed has established a stable resumption point.
    /// Fails if the stream ends or is shut down first.
    pub async fn initialized(&self) -> Result<()> {
        self.ready.wait().await
    }

    /// Called once the subscription is established, before it is ready.
    pub fn on_open<F>(
        &self,
        listener: F,
    ) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open.subscribe(move |_: &()| listener())
    }

    pub fn on<F>(
        &self,
        kind: ChangeKind,
        listener: F,
    ) -> ListenerId
    where
        F: Fn(&ChangeEvent<T>) + Send + Sync + 'static,
    {
        self.listeners(kind).subscribe(listener)
    }

    pub fn off(
        &self,
        kind: ChangeKind,
        id: ListenerId,
    ) -> bool {
        self.listeners(kind).unsubscribe(id)
    }

    /// Opens the subscription and starts delivering events.
    ///
    /// A disabled watcher returns immediately. Opening twice is an error.
    /// Events are consumed on a background task until the stream ends or
    /// `shutdown_signal` fires.
    pub async fn open(
        self: &Arc<Self>,
        shutdown_signal: Option<watch::Receiver<()>>,
    ) -> Result<()> {
        let source = match &self.source {
            Some(source) => source.clone(),
            None => {
                debug!(collection = %self.collection, "change feed disabled, skipping subscription");
                return Ok(());
            }
        };

        {
            let mut state = self.state.lock();
            if *state != WatcherState::Closed {
                return Err(WatcherError::AlreadyOpened(self.collection.clone()).into());
            }
            *state = WatcherState::Replaying;
        }

        let stream = match source.open(self.options).await {
            Ok(stream) => stream,
            Err(e) => {
                *self.state.lock() = WatcherState::Closed;
                return Err(WatcherError::OpenFailed {
                    collection: self.collection.clone(),
                    reason: e.to_string(),
                }
                .into());
            }
        };

        info!(collection = %self.collection, "change stream opened");
        self.on_open.emit(&());

        let watcher = self.clone();
        spawn_task(&format!("change_feed_{}", self.collection), move || async move {
            watcher.pump(stream, shutdown_signal).await;
            Ok(())
        });

        Ok(())
    }

    async fn pump(
        &self,
        mut stream: ChangeStream<T>,
        mut shutdown_signal: Option<watch::Receiver<()>>,
    ) {
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown_signal) => {
                    debug!(collection = %self.collection, "change stream pump shutting down");
                    self.fail_if_pending("shut down before resume token");
                    return;
                }
                item = stream.next() => match item {
                    Some(item) => self.handle_item(item),
                    None => {
                        warn!(collection = %self.collection, "change stream ended");
                        self.fail_if_pending("ended before resume token");
                        return;
                    }
                },
            }
        }
    }

    /// Fails the ready latch if the stream stopped before becoming ready.
    fn fail_if_pending(
        &self,
        reason: &str,
    ) {
        if self.ready.fail(format!("change stream on {} {}", self.collection, reason)) {
            error!(collection = %self.collection, "change stream {}", reason);
        }
    }

    fn handle_item(
        &self,
        item: StreamItem<T>,
    ) {
        match item {
            StreamItem::Change(raw) => {
                if let Some(event) = ChangeEvent::from_raw(raw) {
                    self.dispatch(&event);
                }
            }
            StreamItem::ResumeTokenChanged(token) => {
                trace!(collection = %self.collection, token = %token, "resume token changed");
                if !self.ready.is_open() {
                    *self.state.lock() = WatcherState::Ready;
                    self.ready.open();
                    info!(collection = %self.collection, "change stream ready");
                }
            }
            StreamItem::Error(reason) => {
                error!(collection = %self.collection, "{}", WatcherError::StreamError(reason));
            }
        }
    }

    fn dispatch(
        &self,
        event: &ChangeEvent<T>,
    ) {
        let kind = event.kind();
        CHANGE_EVENTS_TOTAL
            .with_label_values(&[self.collection.as_str(), kind.as_str()])
            .inc();
        trace!(collection = %self.collection, id = %event.id(), kind = %kind, "change event");
        self.listeners(kind).emit(event);
    }

    fn listeners(
        &self,
        kind: ChangeKind,
    ) -> &Listeners<ChangeEvent<T>> {
        match kind {
            ChangeKind::Insert => &self.on_insert,
            ChangeKind::Update => &self.on_update,
            ChangeKind::Delete => &self.on_delete,
        }
    }
}
