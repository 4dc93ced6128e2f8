//! the test_utils folder here will share utils or test components between
//! unit tests in this crate

mod common;

pub use common::*;
