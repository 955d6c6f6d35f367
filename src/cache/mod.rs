mod latch;
mod listeners;
mod reactive_map;

pub use latch::*;
pub use listeners::*;
pub use reactive_map::*;
