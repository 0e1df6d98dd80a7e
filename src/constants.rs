use std::time::Duration;

// -
// Setting keys

/// Address (`host:port`) of the coordination service the cluster registers with
pub const COORDINATION_QUORUM: &str = "coordination.quorum";
/// Number of attempts a client makes before giving up on the cluster
pub const CLIENT_RETRIES_NUMBER: &str = "client.retries.number";
/// Pause between client attempts, in milliseconds
pub const CLIENT_PAUSE_MS: &str = "client.pause.ms";
/// Master info server port; `-1` disables it, `0` allocates a free port
pub const MASTER_INFO_PORT: &str = "master.info.port";
/// Region server info server port; `-1` disables it, `0` allocates a free port
pub const REGIONSERVER_INFO_PORT: &str = "regionserver.info.port";
/// Interval of the background store flush, in milliseconds
pub const CLUSTER_FLUSH_INTERVAL_MS: &str = "cluster.flush.interval.ms";
/// Whether the store lives on disk inside the workspace
pub const CLUSTER_STORAGE_PERSISTENT: &str = "cluster.storage.persistent";

// -
// Defaults forced or suggested by the orchestrator

pub(crate) const DEFAULT_CLIENT_RETRIES: i64 = 1;
pub(crate) const DEFAULT_CLIENT_PAUSE_MS: i64 = 100;
pub(crate) const DEFAULT_FLUSH_INTERVAL_MS: i64 = 1000;
pub(crate) const INFO_PORT_DISABLED: i64 = -1;
pub(crate) const INFO_PORT_ALLOCATE: i64 = 0;

// -
// Subsystem bounds

pub(crate) const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const COORDINATION_IO_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const REGISTRATION_RETRY_INTERVAL: Duration = Duration::from_millis(100);

// -
// Workspace layout

pub(crate) const WORKSPACE_PREFIX: &str = "mini-cluster-";
pub(crate) const COORDINATION_DIR: &str = "coordination";
pub(crate) const COORDINATION_TXN_LOG: &str = "txn.log";
pub(crate) const CLUSTER_DATA_DIR: &str = "cluster/data";

// -
// Coordination registry paths

pub(crate) const MASTER_ZNODE: &str = "/cluster/master";
pub(crate) const REGION_SERVER_ZNODE_PREFIX: &str = "/cluster/rs/";

// -
// Sled trees

pub(crate) const NAMESPACE_TREE: &str = "_namespaces";
pub(crate) const TABLE_DESCRIPTOR_TREE: &str = "_table_descriptors";
pub(crate) const TABLE_DATA_TREE_PREFIX: &str = "_data:";

pub const DEFAULT_NAMESPACE: &str = "default";
pub(crate) const DEFAULT_MAX_VERSIONS: u32 = 1;
