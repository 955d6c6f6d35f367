//! Storage collaborators
//!
//! The mirror never queries or mutates the upstream store itself. It only
//! needs to list a whole collection ([`Collection`]) and, in live mode, to
//! subscribe to its change stream
//! ([`ChangeStreamSource`](crate::ChangeStreamSource)).
//! [`MemCollection`] implements both in-process.

mod collection;
mod document;
mod mem_collection;

pub use collection::*;
pub use document::*;
pub use mem_collection::*;
