//! # doc-mirror
//!
//! In-memory mirrors of remote document collections.
//!
//! A [`ReactiveMap`] is the synchronous read surface every component uses.
//! A [`CacheSynchronizer`] keeps it consistent with its upstream, either by
//! consuming a live change feed through a [`ChangeFeedWatcher`] or by
//! polling and diffing the whole collection. Synchronizers register with the
//! [`StartupCoordinator`], which runs all initial loads in parallel before
//! the [`Runtime`] reports ready.
//!
//! ```text
//!  Runtime::start ──► StartupCoordinator::run_all
//!                          │
//!              ┌───────────┴────────────┐
//!              ▼                        ▼
//!      LiveFeedStrategy          PollingStrategy
//!   watcher → ready → reload    reload → every N ms reload
//!              │                        │
//!              └───────────┬────────────┘
//!                          ▼
//!                ReactiveMap (add / delete listeners)
//! ```

mod cache;
mod config;
mod errors;
pub mod metrics;
mod runtime;
mod startup;
mod storage;
mod sync;
mod utils;
mod watcher;

pub use cache::*;
pub use config::*;
pub use errors::*;
pub use runtime::*;
pub use startup::*;
pub use storage::*;
pub use sync::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
