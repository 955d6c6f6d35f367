use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::ChangeStream;
use crate::ChangeStreamSource;
use crate::CollectionError;
use crate::Document;
use crate::Result;
use crate::StreamItem;
use crate::WatchOptions;

/// Change stream source driven by hand through an mpsc sender.
///
/// Nothing is emitted until the test pushes items, including the resume
/// token, so tests control exactly when a watcher becomes ready.
pub struct ChannelSource<T> {
    name: String,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<StreamItem<T>>>>,
    fail_open: bool,
    opened_with: Mutex<Option<WatchOptions>>,
}

impl<T: Document> ChannelSource<T> {
    pub fn new(name: &str) -> (Self, mpsc::UnboundedSender<StreamItem<T>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            name: name.to_string(),
            receiver: Mutex::new(Some(rx)),
            fail_open: false,
            opened_with: Mutex::new(None),
        };
        (source, tx)
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            receiver: Mutex::new(None),
            fail_open: true,
            opened_with: Mutex::new(None),
        }
    }

    pub fn opened_with(&self) -> Option<WatchOptions> {
        *self.opened_with.lock()
    }
}

#[async_trait]
impl<T: Document> ChangeStreamSource<T> for ChannelSource<T> {
    fn collection(&self) -> String {
        self.name.clone()
    }

    async fn open(
        &self,
        options: WatchOptions,
    ) -> Result<ChangeStream<T>> {
        if self.fail_open {
            return Err(CollectionError::Unavailable("change streams not supported".into()).into());
        }
        *self.opened_with.lock() = Some(options);
        let receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| CollectionError::Unavailable("stream already taken".into()))?;
        Ok(UnboundedReceiverStream::new(receiver).boxed())
    }
}
