mod change_event;
mod source;
#[allow(clippy::module_inception)]
mod watcher;

pub use change_event::*;
pub use source::*;
pub use watcher::*;
