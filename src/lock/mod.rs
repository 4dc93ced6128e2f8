//! The mutex engine and its background renewal loop.

mod mutex;
mod renewal;

pub use mutex::*;

#[cfg(test)]
mod mutex_test;
