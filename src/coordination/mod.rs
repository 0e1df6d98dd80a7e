//! Embedded coordination service: a small path registry the storage cluster
//! registers its master and region servers with.

mod client;
mod launcher;
mod protocol;
mod server;

pub use client::*;
pub use launcher::*;
pub use protocol::Request;
pub use protocol::Response;
