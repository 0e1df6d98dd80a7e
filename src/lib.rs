//! A disposable storage cluster for integration tests.
//!
//! [`MiniCluster`] stands up an embedded coordination service and an embedded
//! storage cluster in a private workspace, provisions the namespaces and
//! tables declared through its [`Builder`], and tears everything down again.
//!
//! ```ignore
//! let mut cluster = MiniCluster::builder()
//!     .add_namespace("ns1")
//!     .add_table("ns1:t1", ["cf"])
//!     .build_cluster();
//! cluster.setup()?;
//! assert_eq!(cluster.count_rows("ns1:t1")?, 0);
//! cluster.teardown()?;
//! ```

mod cluster;
mod config;
mod coordination;
mod errors;
mod lifecycle;
mod schema;
pub mod constants;
pub mod utils;

pub use cluster::*;
pub use coordination::*;
pub use errors::*;
pub use lifecycle::*;
pub use schema::*;
pub use self::config::*;
pub use utils::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
