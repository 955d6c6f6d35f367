//! Document Mirror Error Hierarchy
//!
//! Errors are grouped by the layer that raises them. Only startup-time
//! failures travel back to callers; everything that happens after a cache
//! is initialized is logged and swallowed by the background tasks.

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration values rejected by validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Remote collection access failures
    #[error(transparent)]
    Collection(#[from] CollectionError),

    /// Change feed subscription failures
    #[error(transparent)]
    Watcher(#[from] WatcherError),

    /// Startup task registration and execution failures
    #[error(transparent)]
    Startup(#[from] StartupError),

    /// Cache registry misuse
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The owning synchronizer failed its first reload
    #[error("Cache initialization failed: {0}")]
    InitializationFailed(String),

    #[error("{0}")]
    SignalSenderClosed(String),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    /// `find_all` did not return the collection contents
    #[error("Fetching collection {collection} failed: {reason}")]
    FetchFailed { collection: String, reason: String },

    /// The backing store is not reachable
    #[error("Collection unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// The upstream refused to open a change stream
    #[error("Opening change stream on {collection} failed: {reason}")]
    OpenFailed { collection: String, reason: String },

    /// Error item delivered on an open change stream
    #[error("Change stream error: {0}")]
    StreamError(String),

    /// `open` called twice on the same watcher
    #[error("Change stream on {0} already opened")]
    AlreadyOpened(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// Registration attempted after the coordinator ran
    #[error("Startup tasks have already been run")]
    AlreadyRun,

    /// At least one startup task returned an error
    #[error("{failed} of {total} startup tasks failed, first: {first}")]
    TasksFailed {
        failed: usize,
        total: usize,
        first: Box<Error>,
    },

    /// A startup task panicked
    #[error("Startup task {0} panicked")]
    TaskPanicked(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Collection {0} is already bound")]
    DuplicateCollection(String),

    #[error("Collection {name} is bound to a different document type than {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}
