//! Sled-backed storage for the embedded cluster.
//!
//! Layout:
//! - `_namespaces`: namespace name -> `()`
//! - `_table_descriptors`: `namespace:qualifier` -> bincode [`TableDescriptor`]
//! - `_data:<namespace:qualifier>`: one tree per table holding cells
//!
//! A cell key is `len(row) row len(family) family len(qualifier) qualifier
//! !timestamp` with big-endian `u32` lengths and an inverted `u64` timestamp,
//! so one row's cells are contiguous and the newest version of a column sorts
//! first.

use std::path::Path;

use parking_lot::Mutex;
use parking_lot::RwLock;
use sled::Batch;
use sled::Db;
use sled::Tree;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use super::metrics;
use super::Cell;
use super::RowResult;
use super::TableDescriptor;
use super::TableName;
use crate::constants::*;
use crate::time::next_timestamp;
use crate::StoreError;
use crate::StoreResult;

pub struct Store {
    cluster_id: String,
    db: RwLock<Option<Db>>,
    last_timestamp: Mutex<u64>,
}

impl std::fmt::Debug for Store {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("cluster_id", &self.cluster_id)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Store {
    /// Opens (or creates) an on-disk store rooted at `path`.
    pub fn open(
        path: &Path,
        cluster_id: &str,
    ) -> StoreResult<Self> {
        let db = sled::Config::new().path(path).use_compression(true).open()?;
        info!(path = %path.display(), cluster_id, "opened persistent store");
        Self::init(db, cluster_id)
    }

    /// Opens a store that sled removes once it is dropped.
    pub fn temporary(cluster_id: &str) -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        info!(cluster_id, "opened temporary store");
        Self::init(db, cluster_id)
    }

    fn init(
        db: Db,
        cluster_id: &str,
    ) -> StoreResult<Self> {
        metrics::register_custom_metrics();
        let namespaces = db.open_tree(NAMESPACE_TREE)?;
        namespaces.insert(DEFAULT_NAMESPACE, Vec::<u8>::new())?;
        let store = Self {
            cluster_id: cluster_id.to_string(),
            db: RwLock::new(Some(db)),
            last_timestamp: Mutex::new(0),
        };
        metrics::set_table_count(cluster_id, store.list_tables()?.len());
        Ok(store)
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Flushes and releases the database. Every later call fails with
    /// `StoreError::ClusterStopped`. Closing twice is a no-op.
    pub fn close(&self) -> StoreResult<()> {
        if let Some(db) = self.db.write().take() {
            metrics::remove_cluster(&self.cluster_id);
            db.flush()?;
            info!(cluster_id = %self.cluster_id, "closed store");
        }
        Ok(())
    }

    pub fn flush(&self) -> StoreResult<usize> {
        Ok(self.db()?.flush()?)
    }

    fn db(&self) -> StoreResult<Db> {
        self.db.read().clone().ok_or(StoreError::ClusterStopped)
    }

    fn record(
        &self,
        op: &'static str,
    ) {
        debug_assert!(metrics::STORE_OPERATIONS.contains(&op), "unlisted store operation {op}");
        metrics::record_operation(&self.cluster_id, op);
    }

    // -
    // Namespaces

    #[instrument(skip(self))]
    pub fn create_namespace(
        &self,
        name: &str,
    ) -> StoreResult<()> {
        TableName::validate_part(name).map_err(|reason| StoreError::InvalidTableName {
            name: name.to_string(),
            reason,
        })?;
        let tree = self.db()?.open_tree(NAMESPACE_TREE)?;
        tree.compare_and_swap(name, None as Option<&[u8]>, Some(&[] as &[u8]))?
            .map_err(|_| StoreError::NamespaceExists(name.to_string()))?;
        self.record("create_namespace");
        debug!("namespace created");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete_namespace(
        &self,
        name: &str,
    ) -> StoreResult<()> {
        if !self.namespace_exists(name)? {
            return Err(StoreError::NamespaceNotFound(name.to_string()));
        }
        if self.list_tables()?.iter().any(|t| t.namespace() == name) {
            return Err(StoreError::NamespaceNotEmpty(name.to_string()));
        }
        self.db()?.open_tree(NAMESPACE_TREE)?.remove(name)?;
        self.record("delete_namespace");
        Ok(())
    }

    pub fn namespace_exists(
        &self,
        name: &str,
    ) -> StoreResult<bool> {
        Ok(self.db()?.open_tree(NAMESPACE_TREE)?.contains_key(name)?)
    }

    pub fn list_namespaces(&self) -> StoreResult<Vec<String>> {
        let tree = self.db()?.open_tree(NAMESPACE_TREE)?;
        tree.iter()
            .keys()
            .map(|k| -> StoreResult<String> { Ok(String::from_utf8_lossy(&k?).into_owned()) })
            .collect()
    }

    // -
    // Tables

    #[instrument(skip(self, descriptor), fields(table = %descriptor.name))]
    pub fn create_table(
        &self,
        descriptor: &TableDescriptor,
    ) -> StoreResult<()> {
        let full_name = descriptor.name.full_name();
        if descriptor.families.is_empty() {
            return Err(StoreError::NoColumnFamilies(full_name));
        }
        for (i, family) in descriptor.families.iter().enumerate() {
            let reason = if family.name.is_empty() {
                Some("name is empty")
            } else if family.max_versions == 0 {
                Some("must keep at least one version")
            } else if descriptor.families[..i].iter().any(|f| f.name == family.name) {
                Some("declared twice")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(StoreError::InvalidColumnFamily {
                    table: full_name.clone(),
                    family: family.name.clone(),
                    reason,
                });
            }
        }
        if !self.namespace_exists(descriptor.name.namespace())? {
            return Err(StoreError::NamespaceNotFound(descriptor.name.namespace().to_string()));
        }

        let db = self.db()?;
        let encoded = bincode::serialize(descriptor)?;
        db.open_tree(TABLE_DESCRIPTOR_TREE)?
            .compare_and_swap(&full_name, None as Option<&[u8]>, Some(encoded))?
            .map_err(|_| StoreError::TableExists(descriptor.name.to_string()))?;
        // The data tree exists once this returns, so the table is writable.
        db.open_tree(data_tree_name(&descriptor.name))?;

        self.record("create_table");
        metrics::set_table_count(&self.cluster_id, self.list_tables()?.len());
        debug!("table created");
        Ok(())
    }

    #[instrument(skip(self), fields(table = %table))]
    pub fn delete_table(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        let db = self.db()?;
        if db.open_tree(TABLE_DESCRIPTOR_TREE)?.remove(table.full_name())?.is_none() {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        db.drop_tree(data_tree_name(table))?;
        self.record("delete_table");
        metrics::set_table_count(&self.cluster_id, self.list_tables()?.len());
        Ok(())
    }

    pub fn table_exists(
        &self,
        table: &TableName,
    ) -> StoreResult<bool> {
        Ok(self.db()?.open_tree(TABLE_DESCRIPTOR_TREE)?.contains_key(table.full_name())?)
    }

    pub fn table_descriptor(
        &self,
        table: &TableName,
    ) -> StoreResult<TableDescriptor> {
        let raw = self
            .db()?
            .open_tree(TABLE_DESCRIPTOR_TREE)?
            .get(table.full_name())?
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        Ok(bincode::deserialize(&raw)?)
    }

    pub fn list_tables(&self) -> StoreResult<Vec<TableName>> {
        let tree = self.db()?.open_tree(TABLE_DESCRIPTOR_TREE)?;
        tree.iter()
            .values()
            .map(|v| -> StoreResult<TableName> {
                let descriptor: TableDescriptor = bincode::deserialize(&v?)?;
                Ok(descriptor.name)
            })
            .collect()
    }

    /// Drops and recreates the table's data, keeping its descriptor.
    #[instrument(skip(self), fields(table = %table))]
    pub fn truncate_table(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        self.table_descriptor(table)?;
        let db = self.db()?;
        let name = data_tree_name(table);
        db.drop_tree(&name)?;
        db.open_tree(&name)?;
        self.record("truncate_table");
        Ok(())
    }

    /// Removes every row of the table.
    #[instrument(skip(self), fields(table = %table))]
    pub fn delete_table_data(
        &self,
        table: &TableName,
    ) -> StoreResult<()> {
        self.data_tree(table)?.clear()?;
        self.record("delete_table_data");
        Ok(())
    }

    fn data_tree(
        &self,
        table: &TableName,
    ) -> StoreResult<Tree> {
        if !self.table_exists(table)? {
            return Err(StoreError::TableNotFound(table.to_string()));
        }
        Ok(self.db()?.open_tree(data_tree_name(table))?)
    }

    // -
    // Cells

    /// Writes one cell version and prunes versions beyond the family's limit.
    /// Returns the timestamp assigned to the new version.
    #[instrument(skip(self, row, family, qualifier, value), fields(table = %table))]
    pub fn put(
        &self,
        table: &TableName,
        row: &[u8],
        family: &[u8],
        qualifier: &[u8],
        value: &[u8],
    ) -> StoreResult<u64> {
        let descriptor = self.table_descriptor(table)?;
        let max_versions = descriptor
            .family(family)
            .ok_or_else(|| StoreError::FamilyNotFound {
                table: table.to_string(),
                family: String::from_utf8_lossy(family).into_owned(),
            })?
            .max_versions;
        let tree = self.data_tree(table)?;

        let timestamp = {
            let mut last = self.last_timestamp.lock();
            *last = next_timestamp(*last);
            *last
        };
        tree.insert(encode_cell_key(row, family, qualifier, timestamp), value)?;

        let mut stale = Batch::default();
        let mut has_stale = false;
        for key in tree
            .scan_prefix(encode_column_prefix(row, family, qualifier))
            .keys()
            .skip(max_versions as usize)
        {
            stale.remove(key?);
            has_stale = true;
        }
        if has_stale {
            tree.apply_batch(stale)?;
        }

        self.record("put");
        Ok(timestamp)
    }

    /// Reads one row. `columns` restricts the result to the given
    /// `(family, Some(qualifier))` columns or whole `(family, None)` families;
    /// empty means every column. At most `max_versions` versions per column.
    #[instrument(skip(self, row, columns), fields(table = %table))]
    pub fn get(
        &self,
        table: &TableName,
        row: &[u8],
        columns: &[(Vec<u8>, Option<Vec<u8>>)],
        max_versions: u32,
    ) -> StoreResult<Option<RowResult>> {
        let tree = self.data_tree(table)?;
        let mut cells: Vec<Cell> = Vec::new();
        let mut versions_seen = 0u32;

        for item in tree.scan_prefix(encode_row_prefix(row)) {
            let (key, value) = item?;
            let Some(cell) = decode_cell(&key, &value) else {
                continue;
            };
            if !columns.is_empty() && !selects(columns, &cell) {
                continue;
            }
            let same_column = cells
                .last()
                .is_some_and(|c| c.family == cell.family && c.qualifier == cell.qualifier);
            versions_seen = if same_column { versions_seen + 1 } else { 1 };
            if versions_seen <= max_versions.max(1) {
                cells.push(cell);
            }
        }

        self.record("get");
        Ok((!cells.is_empty()).then(|| RowResult {
            row: row.to_vec(),
            cells,
        }))
    }

    /// Deletes every cell of the row. Deleting a missing row is not an error.
    #[instrument(skip(self, row), fields(table = %table))]
    pub fn delete_row(
        &self,
        table: &TableName,
        row: &[u8],
    ) -> StoreResult<()> {
        let tree = self.data_tree(table)?;
        let mut batch = Batch::default();
        for key in tree.scan_prefix(encode_row_prefix(row)).keys() {
            batch.remove(key?);
        }
        tree.apply_batch(batch)?;
        self.record("delete");
        Ok(())
    }

    /// Every row with the newest version of each column.
    #[instrument(skip(self), fields(table = %table))]
    pub fn scan(
        &self,
        table: &TableName,
    ) -> StoreResult<Vec<RowResult>> {
        let tree = self.data_tree(table)?;
        let mut rows: Vec<RowResult> = Vec::new();

        for item in tree.iter() {
            let (key, value) = item?;
            let Some(cell) = decode_cell(&key, &value) else {
                continue;
            };
            match rows.last_mut() {
                Some(current) if current.row == cell.row => {
                    let newer_exists = current
                        .cells
                        .last()
                        .is_some_and(|c| c.family == cell.family && c.qualifier == cell.qualifier);
                    if !newer_exists {
                        current.cells.push(cell);
                    }
                }
                _ => rows.push(RowResult {
                    row: cell.row.clone(),
                    cells: vec![cell],
                }),
            }
        }

        self.record("scan");
        Ok(rows)
    }

    /// Full-scan row count, optionally counting only rows with a cell in one
    /// of `families`.
    #[instrument(skip(self, families), fields(table = %table))]
    pub fn count_rows(
        &self,
        table: &TableName,
        families: &[Vec<u8>],
    ) -> StoreResult<u64> {
        let tree = self.data_tree(table)?;
        let mut count = 0u64;
        let mut last_counted: Option<Vec<u8>> = None;

        for key in tree.iter().keys() {
            let key = key?;
            let Some((row, family, _, _)) = decode_key(&key) else {
                continue;
            };
            if !families.is_empty() && !families.iter().any(|f| f.as_slice() == family) {
                continue;
            }
            if last_counted.as_deref() != Some(row) {
                count += 1;
                last_counted = Some(row.to_vec());
            }
        }

        self.record("count_rows");
        Ok(count)
    }
}

fn data_tree_name(table: &TableName) -> String {
    format!("{TABLE_DATA_TREE_PREFIX}{}", table.full_name())
}

fn selects(
    columns: &[(Vec<u8>, Option<Vec<u8>>)],
    cell: &Cell,
) -> bool {
    columns.iter().any(|(family, qualifier)| {
        *family == cell.family && qualifier.as_ref().is_none_or(|q| *q == cell.qualifier)
    })
}

fn push_part(
    buf: &mut Vec<u8>,
    part: &[u8],
) {
    buf.extend_from_slice(&(part.len() as u32).to_be_bytes());
    buf.extend_from_slice(part);
}

pub(crate) fn encode_row_prefix(row: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + row.len());
    push_part(&mut buf, row);
    buf
}

pub(crate) fn encode_column_prefix(
    row: &[u8],
    family: &[u8],
    qualifier: &[u8],
) -> Vec<u8> {
    let mut buf = encode_row_prefix(row);
    push_part(&mut buf, family);
    push_part(&mut buf, qualifier);
    buf
}

pub(crate) fn encode_cell_key(
    row: &[u8],
    family: &[u8],
    qualifier: &[u8],
    timestamp: u64,
) -> Vec<u8> {
    let mut buf = encode_column_prefix(row, family, qualifier);
    buf.extend_from_slice(&(u64::MAX - timestamp).to_be_bytes());
    buf
}

/// Splits a cell key into `(row, family, qualifier, timestamp)`.
pub(crate) fn decode_key(key: &[u8]) -> Option<(&[u8], &[u8], &[u8], u64)> {
    fn take_part(buf: &[u8]) -> Option<(&[u8], &[u8])> {
        let len_bytes: [u8; 4] = buf.get(..4)?.try_into().ok()?;
        let len = u32::from_be_bytes(len_bytes) as usize;
        let part = buf.get(4..4 + len)?;
        Some((part, &buf[4 + len..]))
    }

    let (row, rest) = take_part(key)?;
    let (family, rest) = take_part(rest)?;
    let (qualifier, rest) = take_part(rest)?;
    let ts_bytes: [u8; 8] = rest.try_into().ok()?;
    Some((row, family, qualifier, u64::MAX - u64::from_be_bytes(ts_bytes)))
}

fn decode_cell(
    key: &[u8],
    value: &[u8],
) -> Option<Cell> {
    let (row, family, qualifier, timestamp) = decode_key(key)?;
    Some(Cell {
        row: row.to_vec(),
        family: family.to_vec(),
        qualifier: qualifier.to_vec(),
        timestamp,
        value: value.to_vec(),
    })
}
