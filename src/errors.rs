//! Mini Cluster Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: lifecycle orchestration
//! (state, startup, shutdown, teardown aggregation), the embedded storage
//! cluster, and the embedded coordination service.

use std::fmt;
use std::time::Duration;

use config::ConfigError;

use crate::LifecycleState;

pub type Result<T> = std::result::Result<T, Error>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The OS could not hand out an ephemeral port
    #[error("Unable to find an open port: {0}")]
    ResourceExhaustion(#[source] std::io::Error),

    /// A subsystem did not report itself ready within its startup bound
    #[error("{component} did not become ready within {timeout:?}")]
    StartupTimeout {
        component: &'static str,
        timeout: Duration,
    },

    /// A subsystem reported a failure before becoming ready
    #[error("{component} failed to start: {reason}")]
    Startup {
        component: &'static str,
        reason: String,
    },

    /// A subsystem did not shut down cleanly
    #[error("{component} failed to shut down: {reason}")]
    Shutdown {
        component: &'static str,
        reason: String,
    },

    /// Lifecycle method or data operation called out of order
    #[error("Cannot {operation} while the mini cluster is {state}")]
    InvalidState {
        operation: &'static str,
        state: LifecycleState,
    },

    /// One or more teardown steps failed
    #[error(transparent)]
    AggregatedTeardown(#[from] TeardownErrors),

    /// Namespace or table creation failed against the live cluster
    #[error("Failed to provision {object}: {source}")]
    SchemaProvisioning {
        object: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },
}

impl Error {
    pub(crate) fn invalid_state(
        operation: &'static str,
        state: LifecycleState,
    ) -> Self {
        Error::InvalidState { operation, state }
    }

    /// True for the not-ready signal returned by lifecycle-guarded operations.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState { .. })
    }
}

/// Every failure captured while tearing a mini cluster down, in step order.
#[derive(Debug)]
pub struct TeardownErrors {
    errors: Vec<Error>,
}

impl TeardownErrors {
    pub(crate) fn new(errors: Vec<Error>) -> Self {
        Self { errors }
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_inner(self) -> Vec<Error> {
        self.errors
    }
}

impl fmt::Display for TeardownErrors {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{} teardown step(s) failed", self.errors.len())?;
        for (i, e) in self.errors.iter().enumerate() {
            write!(f, "\n  {}: {}", i + 1, e)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.errors.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    SledError(#[from] sled::Error),

    #[error(transparent)]
    BincodeError(#[from] bincode::Error),

    #[error("Namespace {0} already exists")]
    NamespaceExists(String),

    #[error("Namespace {0} not found")]
    NamespaceNotFound(String),

    #[error("Namespace {0} still contains tables")]
    NamespaceNotEmpty(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Column family {family} does not exist in table {table}")]
    FamilyNotFound { table: String, family: String },

    #[error("Invalid table name {name:?}: {reason}")]
    InvalidTableName { name: String, reason: &'static str },

    #[error("Table {0} must declare at least one column family")]
    NoColumnFamilies(String),

    #[error("Invalid column family {family:?} in table {table}: {reason}")]
    InvalidColumnFamily {
        table: String,
        family: String,
        reason: &'static str,
    },

    #[error("Storage cluster is not running")]
    ClusterStopped,

    #[error("Connection is closed")]
    ConnectionClosed,
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("Malformed coordination message: {0}")]
    Protocol(String),

    #[error("Node {0} does not exist")]
    NoNode(String),

    #[error("Node {0} already exists")]
    NodeExists(String),

    #[error("Coordination service error: {0}")]
    Server(String),

    #[error("Coordination service at {address} unreachable after {attempts} attempt(s)")]
    Unreachable { address: String, attempts: usize },
}
