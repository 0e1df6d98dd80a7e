//! Creates the namespaces and tables a configuration declares, against a
//! cluster that is already serving.

use tracing::debug;
use tracing::info;

use crate::Admin;
use crate::ClusterConfiguration;
use crate::ColumnFamilyDescriptor;
use crate::Error;
use crate::Result;
use crate::StoreError;
use crate::TableDescriptor;
use crate::TableName;

pub struct SchemaProvisioner {
    admin: Admin,
}

impl SchemaProvisioner {
    pub fn new(admin: Admin) -> Self {
        Self { admin }
    }

    pub fn create_namespace(
        &self,
        name: &str,
    ) -> Result<()> {
        self.admin
            .create_namespace(name)
            .map_err(|source| provisioning(format!("namespace {name}"), source))?;
        debug!(namespace = name, "namespace provisioned");
        Ok(())
    }

    /// Creates `name` with `families`, each keeping `max_versions` versions
    /// (store default when `None`). Returns once the table accepts writes.
    pub fn create_table<S: AsRef<str>>(
        &self,
        name: &str,
        families: &[S],
        max_versions: Option<u32>,
    ) -> Result<()> {
        let table = parse_table(name)?;
        let descriptor = TableDescriptor::new(table).with_families(families.iter().map(|f| f.as_ref()), max_versions);
        self.create_table_with_descriptor(&descriptor)
    }

    /// Creates `name` with a version limit per family.
    pub fn create_table_with_family_versions<S: AsRef<str>>(
        &self,
        name: &str,
        families: &[(S, u32)],
    ) -> Result<()> {
        let table = parse_table(name)?;
        let descriptor = families.iter().fold(TableDescriptor::new(table), |d, (family, versions)| {
            d.with_family(ColumnFamilyDescriptor::new(family.as_ref()).with_max_versions(*versions))
        });
        self.create_table_with_descriptor(&descriptor)
    }

    pub fn create_table_with_descriptor(
        &self,
        descriptor: &TableDescriptor,
    ) -> Result<()> {
        self.admin
            .create_table(descriptor)
            .map_err(|source| provisioning(format!("table {}", descriptor.name), source))?;
        debug!(table = %descriptor.name, "table provisioned");
        Ok(())
    }

    /// Every declared namespace first, then every declared table, each in
    /// declaration order. A namespace declared twice is created once.
    pub fn provision(
        &self,
        configuration: &ClusterConfiguration,
    ) -> Result<()> {
        let mut created: Vec<&str> = Vec::with_capacity(configuration.namespaces().len());
        for namespace in configuration.namespaces() {
            if created.contains(&namespace.as_str()) {
                continue;
            }
            self.create_namespace(namespace)?;
            created.push(namespace);
        }

        for table in configuration.tables() {
            self.create_table(&table.name, &table.families, table.max_versions)?;
        }

        info!(
            namespaces = created.len(),
            tables = configuration.tables().len(),
            "schema provisioned"
        );
        Ok(())
    }
}

fn parse_table(name: &str) -> Result<TableName> {
    name.parse::<TableName>()
        .map_err(|source| provisioning(format!("table {name}"), source))
}

fn provisioning(
    object: String,
    source: StoreError,
) -> Error {
    Error::SchemaProvisioning { object, source }
}
