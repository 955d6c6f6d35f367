mod builder;
mod registry;
#[allow(clippy::module_inception)]
mod runtime;

pub use builder::*;
pub use registry::*;
pub use runtime::*;
