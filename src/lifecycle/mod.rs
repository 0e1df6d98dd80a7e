mod fixture;
mod mini_cluster;
mod state;

pub use fixture::*;
pub use mini_cluster::*;
pub use state::*;

#[cfg(test)]
mod fixture_test;
