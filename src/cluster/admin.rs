use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::Store;
use super::TableDescriptor;
use super::TableName;
use crate::StoreError;
use crate::StoreResult;

/// Administrative operations on the embedded cluster.
///
/// Shares the closed flag of the [`Connection`](super::Connection) it came
/// from; closing the connection disables its admins too.
#[derive(Debug, Clone)]
pub struct Admin {
    store: Arc<Store>,
    closed: Arc<AtomicBool>,
}

impl Admin {
    pub(crate) fn new(
        store: Arc<Store>,
        closed: Arc<AtomicBool>,
    ) -> Self {
        Self { store, closed }
    }

    fn store(&self) -> StoreResult<&Store> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(&self.store)
    }

    pub fn create_namespace(
        &self,
        name: &str,
    ) -> StoreResult<()> {
        self.store()?.create_namespace(name)
    }

    pub fn delete_namespace(
        &self,
        name: &str,
    ) -> StoreResult<()> {
        self.store()?.delete_namespace(name)
    }

    pub fn namespace_exists(
        &self,
        name: &str,
    ) -> StoreResult<bool> {
        self.store()?.namespace_exists(name)
    }

    pub fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        self.store()?.list_namespaces()
    }

    /// Returns once the table accepts writes.
    pub fn create_table(
        &self,
        descriptor: &TableDescriptor,
    ) -> StoreResult<()> {
        self.store()?.create_table(descriptor)
    }

    pub fn delete_table(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        self.store()?.delete_table(table)
    }

    pub fn table_exists(
        &self,
        table: &TableName,
    ) -> StoreResult<bool> {
        self.store()?.table_exists(table)
    }

    pub fn list_tables(&self) -> StoreResult<Vec<TableName>> {
        self.store()?.list_tables()
    }

    pub fn table_descriptor(
        &self,
        table: &TableName,
    ) -> StoreResult<TableDescriptor> {
        self.store()?.table_descriptor(table)
    }

    pub fn truncate_table(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        self.store()?.truncate_table(table)
    }

    pub fn delete_table_data(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        self.store()?.delete_table_data(table)
    }
}
