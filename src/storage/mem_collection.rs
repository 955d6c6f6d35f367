//! In-process collection with a change stream.
//!
//! Every mutation updates the table and is published on a broadcast channel.
//! Each opened stream first yields a resume token, then the changes made
//! after it was opened. A subscriber that falls more than `buffer_size`
//! changes behind receives a [`StreamItem::Error`] for the skipped range.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::ChangeStream;
use crate::ChangeStreamSource;
use crate::Collection;
use crate::Document;
use crate::OperationType;
use crate::RawChange;
use crate::Result;
use crate::StreamItem;
use crate::WatchOptions;

pub struct MemCollection<T: Document> {
    name: String,
    docs: RwLock<HashMap<String, T>>,
    changes: broadcast::Sender<RawChange<T>>,
    next_token: AtomicU64,
}

impl<T: Document> MemCollection<T> {
    pub fn new(
        name: impl Into<String>,
        buffer_size: usize,
    ) -> Self {
        let (changes, _) = broadcast::channel(buffer_size.max(1));
        Self {
            name: name.into(),
            docs: RwLock::new(HashMap::new()),
            changes,
            next_token: AtomicU64::new(1),
        }
    }

    /// Seeds the collection without publishing changes.
    pub fn with_documents(
        name: impl Into<String>,
        buffer_size: usize,
        docs: impl IntoIterator<Item = T>,
    ) -> Self {
        let collection = Self::new(name, buffer_size);
        {
            let mut table = collection.docs.write();
            for doc in docs {
                table.insert(doc.id().to_string(), doc);
            }
        }
        collection
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<T> {
        self.docs.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts or replaces `doc`; returns the previous version.
    pub fn upsert(
        &self,
        doc: T,
    ) -> Option<T> {
        let id = doc.id().to_string();
        let previous = self.docs.write().insert(id.clone(), doc.clone());

        let change = match &previous {
            None => RawChange::insert(doc),
            Some(_) => RawChange {
                operation_type: OperationType::Replace,
                document_key: id,
                full_document: Some(doc),
                full_document_before_change: previous.clone(),
                update_description: None,
            },
        };
        self.publish(change);
        previous
    }

    pub fn remove(
        &self,
        id: &str,
    ) -> Option<T> {
        let removed = self.docs.write().remove(id);
        if let Some(before) = &removed {
            self.publish(RawChange::delete(id, Some(before.clone())));
        }
        removed
    }

    fn publish(
        &self,
        change: RawChange<T>,
    ) {
        if self.changes.send(change).is_err() {
            trace!(collection = %self.name, "no open change streams");
        }
    }
}

fn apply_options<T>(
    mut change: RawChange<T>,
    options: WatchOptions,
) -> RawChange<T> {
    let is_update = matches!(
        change.operation_type,
        OperationType::Update | OperationType::Replace
    );
    if is_update && (!options.full_document || !options.hydrate) {
        change.full_document = None;
    }
    if !options.full_document_before_change || !options.hydrate {
        change.full_document_before_change = None;
    }
    change
}

#[async_trait]
impl<T: Document> Collection<T> for MemCollection<T> {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        Ok(self.docs.read().values().cloned().collect())
    }
}

#[async_trait]
impl<T: Document> ChangeStreamSource<T> for MemCollection<T> {
    fn collection(&self) -> String {
        self.name.clone()
    }

    async fn open(
        &self,
        options: WatchOptions,
    ) -> Result<ChangeStream<T>> {
        // Subscribe before handing out the token so nothing published after
        // the token is missed.
        let receiver = self.changes.subscribe();
        let token = format!(
            "{}:{}",
            self.name,
            self.next_token.fetch_add(1, Ordering::Relaxed)
        );

        let changes = BroadcastStream::new(receiver).map(move |received| match received {
            Ok(change) => StreamItem::Change(apply_options(change, options)),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                StreamItem::Error(format!("change stream lagged, {skipped} changes skipped"))
            }
        });

        Ok(stream::once(async move { StreamItem::ResumeTokenChanged(token) })
            .chain(changes)
            .boxed())
    }
}
