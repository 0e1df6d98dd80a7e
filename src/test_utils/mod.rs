//! Ready-made launcher mocks shared by the unit tests.
mod mock;

pub use mock::*;
