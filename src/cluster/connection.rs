//! Client-side handles to the embedded cluster.
//!
//! A [`Connection`] is obtained through the coordination service the same way
//! an external client would find the cluster: by reading the master
//! registration. Tables and admins handed out by a connection stop working
//! once it is closed.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use super::Admin;
use super::RowResult;
use super::Store;
use super::TableDescriptor;
use super::TableName;
use crate::constants::CLIENT_PAUSE_MS;
use crate::constants::CLIENT_RETRIES_NUMBER;
use crate::constants::DEFAULT_CLIENT_PAUSE_MS;
use crate::constants::DEFAULT_CLIENT_RETRIES;
use crate::constants::MASTER_ZNODE;
use crate::CoordinationClient;
use crate::CoordinationError;
use crate::Result;
use crate::Settings;
use crate::StoreError;
use crate::StoreResult;

#[derive(Debug)]
pub struct Connection {
    coordination_address: String,
    store: Arc<Store>,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Locates the cluster's master through the coordination service at
    /// `coordination_address`, honouring `client.retries.number` and
    /// `client.pause.ms` from `settings`.
    pub fn open(
        coordination_address: &str,
        store: Arc<Store>,
        settings: &Settings,
    ) -> Result<Self> {
        let attempts = settings.get_i64_or(CLIENT_RETRIES_NUMBER, DEFAULT_CLIENT_RETRIES)?.max(1) as usize;
        let pause = Duration::from_millis(settings.get_i64_or(CLIENT_PAUSE_MS, DEFAULT_CLIENT_PAUSE_MS)?.max(0) as u64);

        let mut last_error = None;
        for attempt in 1..=attempts {
            match lookup_master(coordination_address) {
                Ok(master) if master == store.cluster_id() => {
                    if !store.is_open() {
                        return Err(StoreError::ClusterStopped.into());
                    }
                    debug!(coordination_address, %master, attempt, "connection opened");
                    return Ok(Self {
                        coordination_address: coordination_address.to_string(),
                        store,
                        closed: Arc::new(AtomicBool::new(false)),
                    });
                }
                Ok(master) => {
                    last_error = Some(CoordinationError::Server(format!(
                        "registered master {master} is not cluster {}",
                        store.cluster_id()
                    )));
                }
                Err(e) => {
                    warn!(coordination_address, attempt, attempts, "master lookup failed: {}", e);
                    last_error = Some(e);
                }
            }
            if attempt < attempts {
                thread::sleep(pause);
            }
        }

        Err(last_error
            .unwrap_or(CoordinationError::Unreachable {
                address: coordination_address.to_string(),
                attempts,
            })
            .into())
    }

    pub fn coordination_address(&self) -> &str {
        &self.coordination_address
    }

    fn check_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(())
    }

    /// Handle to an existing table.
    ///
    /// The handle shares this connection's lifetime: once the connection is
    /// closed or dropped every call on it fails with `ConnectionClosed`. Keep
    /// the connection bound for as long as the table is used.
    pub fn table(
        &self,
        name: &str,
    ) -> StoreResult<Table> {
        self.check_open()?;
        let name: TableName = name.parse()?;
        if !self.store.table_exists(&name)? {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        Ok(Table {
            name,
            store: self.store.clone(),
            closed: self.closed.clone(),
        })
    }

    pub fn admin(&self) -> StoreResult<Admin> {
        self.check_open()?;
        Ok(Admin::new(self.store.clone(), self.closed.clone()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closing twice is a no-op.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!(coordination_address = %self.coordination_address, "connection closed");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn lookup_master(coordination_address: &str) -> std::result::Result<String, CoordinationError> {
    CoordinationClient::connect(coordination_address)?.get(MASTER_ZNODE)
}

/// Data operations on one table.
#[derive(Debug, Clone)]
pub struct Table {
    name: TableName,
    store: Arc<Store>,
    closed: Arc<AtomicBool>,
}

impl Table {
    pub fn name(&self) -> &TableName {
        &self.name
    }

    fn store(&self) -> StoreResult<&Store> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(&self.store)
    }

    pub fn descriptor(&self) -> StoreResult<TableDescriptor> {
        self.store()?.table_descriptor(&self.name)
    }

    /// Writes every column of `put`. Unknown families fail the whole put
    /// before anything is written.
    pub fn put(
        &self,
        put: &Put,
    ) -> StoreResult<()> {
        let store = self.store()?;
        let descriptor = store.table_descriptor(&self.name)?;
        if let Some((family, _, _)) = put.columns.iter().find(|(f, _, _)| descriptor.family(f).is_none()) {
            return Err(StoreError::FamilyNotFound {
                table: self.name.to_string(),
                family: String::from_utf8_lossy(family).into_owned(),
            });
        }
        for (family, qualifier, value) in &put.columns {
            store.put(&self.name, &put.row, family, qualifier, value)?;
        }
        Ok(())
    }

    pub fn get(
        &self,
        get: &Get,
    ) -> StoreResult<Option<RowResult>> {
        self.store()?.get(&self.name, &get.row, &get.columns, get.max_versions)
    }

    pub fn delete(
        &self,
        row: impl AsRef<[u8]>,
    ) -> StoreResult<()> {
        self.store()?.delete_row(&self.name, row.as_ref())
    }

    pub fn scan(&self) -> StoreResult<Vec<RowResult>> {
        self.store()?.scan(&self.name)
    }

    pub fn count_rows(&self) -> StoreResult<u64> {
        self.store()?.count_rows(&self.name, &[])
    }

    /// Rows holding at least one cell in any of `families`.
    pub fn count_rows_in_families<S: AsRef<str>>(
        &self,
        families: &[S],
    ) -> StoreResult<u64> {
        let families: Vec<Vec<u8>> = families.iter().map(|f| f.as_ref().as_bytes().to_vec()).collect();
        self.store()?.count_rows(&self.name, &families)
    }
}

/// Columns to write to one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    row: Vec<u8>,
    columns: Vec<(Vec<u8>, Vec<u8>, Vec<u8>)>,
}

impl Put {
    pub fn new(row: impl AsRef<[u8]>) -> Self {
        Self {
            row: row.as_ref().to_vec(),
            columns: Vec::new(),
        }
    }

    pub fn add_column(
        mut self,
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Self {
        self.columns.push((
            family.as_ref().to_vec(),
            qualifier.as_ref().to_vec(),
            value.as_ref().to_vec(),
        ));
        self
    }
}

/// Read of one row. Without columns every column is returned; one version
/// per column unless [`Get::max_versions`] asks for more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Get {
    row: Vec<u8>,
    columns: Vec<(Vec<u8>, Option<Vec<u8>>)>,
    max_versions: u32,
}

impl Get {
    pub fn new(row: impl AsRef<[u8]>) -> Self {
        Self {
            row: row.as_ref().to_vec(),
            columns: Vec::new(),
            max_versions: 1,
        }
    }

    pub fn add_family(
        mut self,
        family: impl AsRef<[u8]>,
    ) -> Self {
        self.columns.push((family.as_ref().to_vec(), None));
        self
    }

    pub fn add_column(
        mut self,
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
    ) -> Self {
        self.columns
            .push((family.as_ref().to_vec(), Some(qualifier.as_ref().to_vec())));
        self
    }

    pub fn max_versions(
        mut self,
        versions: u32,
    ) -> Self {
        self.max_versions = versions.max(1);
        self
    }
}
