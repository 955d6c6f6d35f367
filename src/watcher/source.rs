use async_trait::async_trait;
use futures::stream::BoxStream;

use super::StreamItem;
use crate::Document;
use crate::Result;

pub type ChangeStream<T> = BoxStream<'static, StreamItem<T>>;

/// What a watcher asks the upstream to include in each change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Post-update document bodies on update events
    pub full_document: bool,
    /// Pre-delete document bodies, when the upstream retains them
    pub full_document_before_change: bool,
    /// Decode bodies into the domain document type
    pub hydrate: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            full_document: true,
            full_document_before_change: true,
            hydrate: true,
        }
    }
}

/// Opens change streams on one remote collection.
///
/// Reconnection and backoff belong to the implementation; a stream that
/// ends is not reopened by the watcher.
#[async_trait]
pub trait ChangeStreamSource<T: Document>: Send + Sync + 'static {
    fn collection(&self) -> String;

    async fn open(
        &self,
        options: WatchOptions,
    ) -> Result<ChangeStream<T>>;
}
