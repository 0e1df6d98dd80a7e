//! Embedded storage cluster: a sled-backed table store with a master that
//! registers itself with the coordination service, optional info servers, and
//! the client API tests use to talk to it.

mod admin;
mod connection;
mod info_server;
mod launcher;
mod metrics;
mod model;
mod store;

pub use admin::*;
pub use connection::*;
pub use info_server::ClusterStatus;
pub use launcher::*;
pub use model::*;
pub use store::Store;

#[cfg(test)]
mod store_test;
