mod binding;
mod strategy;
mod synchronizer;

pub use binding::*;
pub use strategy::*;
pub use synchronizer::*;

#[cfg(test)]
mod strategy_test;
