//! Mini cluster configuration.
//!
//! A [`ClusterConfiguration`] is accumulated through the [`Builder`] (or loaded
//! from a TOML document) and handed once to a [`crate::MiniCluster`]. It is never
//! mutated after the hand-off.
//!
//! TOML layout:
//! ```toml
//! teardown_scope = "per_test"
//! namespaces = ["ns1"]
//!
//! [[tables]]
//! name = "ns1:t1"
//! families = ["cf"]
//! max_versions = 3          # optional, applies to every family
//!
//! [settings]
//! "client.retries.number" = "3"
//! "some.multi.valued" = ["a", "b"]
//! ```

mod builder;
mod settings;
pub use builder::*;
pub use settings::*;


//---
use std::path::Path;

use config::Config;
use config::File;
use config::FileFormat;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;
use crate::TableName;
use crate::TeardownScope;

/// Declaration of a table created during setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    /// `namespace:qualifier`, or a bare qualifier in the default namespace
    pub name: String,
    pub families: Vec<String>,
    /// Maximum stored versions per cell for every family; store default if absent
    #[serde(default)]
    pub max_versions: Option<u32>,
}

impl TableDefinition {
    pub fn new<I, S>(
        name: impl Into<String>,
        families: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            families: families.into_iter().map(Into::into).collect(),
            max_versions: None,
        }
    }

    pub fn with_max_versions(
        mut self,
        max_versions: u32,
    ) -> Self {
        self.max_versions = Some(max_versions);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfiguration {
    /// Custom settings; they take precedence over the orchestrator defaults
    #[serde(default)]
    pub(crate) settings: Settings,

    /// Namespaces created at startup, in declaration order
    #[serde(default)]
    pub(crate) namespaces: Vec<String>,

    /// Tables created at startup, after every namespace, in declaration order
    #[serde(default)]
    pub(crate) tables: Vec<TableDefinition>,

    /// Which framework callbacks drive setup and teardown
    #[serde(default)]
    pub(crate) teardown_scope: TeardownScope,
}

impl ClusterConfiguration {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// Parses and validates a TOML configuration document.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let configuration: ClusterConfiguration = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Loads and validates a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let configuration: ClusterConfiguration = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml).required(true))
            .build()?
            .try_deserialize()?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Checks names before anything is started.
    /// # Errors
    /// Returns `Error::InvalidConfig` for an empty namespace, an unparsable
    /// table name, or a table without column families.
    pub fn validate(&self) -> Result<()> {
        for ns in &self.namespaces {
            TableName::validate_part(ns)
                .map_err(|reason| Error::InvalidConfig(format!("namespace {ns:?}: {reason}")))?;
        }

        for table in &self.tables {
            table
                .name
                .parse::<TableName>()
                .map_err(|e| Error::InvalidConfig(e.to_string()))?;
            if table.families.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "table {} declares no column families",
                    table.name
                )));
            }
            if let Some(family) = table.families.iter().find(|f| f.is_empty()) {
                return Err(Error::InvalidConfig(format!(
                    "table {} declares an empty column family name {family:?}",
                    table.name
                )));
            }
            let duplicate = table
                .families
                .iter()
                .enumerate()
                .find_map(|(i, f)| table.families[..i].contains(f).then_some(f));
            if let Some(family) = duplicate {
                return Err(Error::InvalidConfig(format!(
                    "table {} declares column family {family:?} twice",
                    table.name
                )));
            }
            if table.max_versions == Some(0) {
                return Err(Error::InvalidConfig(format!(
                    "table {} must keep at least one version",
                    table.name
                )));
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn teardown_scope(&self) -> TeardownScope {
        self.teardown_scope
    }
}
