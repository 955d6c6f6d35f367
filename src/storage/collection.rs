use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::Document;
use crate::Result;

/// Read access to a remote collection
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Collection<T: Document>: Send + Sync + 'static {
    /// Name used for logging, metrics labels and registry lookups
    fn name(&self) -> String;

    /// Fetches every document currently in the collection.
    ///
    /// Timeouts, if any, are the implementation's concern.
    async fn find_all(&self) -> Result<Vec<T>>;
}
