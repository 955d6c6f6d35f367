//! Shared fixtures for unit tests
mod common;
mod mock_source;

pub use common::*;
pub use mock_source::*;
