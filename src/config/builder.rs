//! Fluent accumulation of a [`ClusterConfiguration`].
//!
//! ```ignore
//! let mut cluster = MiniCluster::builder()
//!     .add_namespace("ns1")
//!     .add_table("ns1:t1", ["cf"])
//!     .set_custom_config("client.retries.number", "3")
//!     .build_cluster();
//! cluster.setup()?;
//! ```
//!
//! `build()`/`build_cluster()` consume the builder, so nothing can be changed
//! after the configuration is handed off.

use super::ClusterConfiguration;
use super::SettingValue;
use super::TableDefinition;
use crate::ClusterLauncher;
use crate::CoordinationLauncher;
use crate::MiniCluster;
use crate::TeardownScope;

#[derive(Default)]
pub struct Builder {
    configuration: ClusterConfiguration,
    coordination_launcher: Option<Box<dyn CoordinationLauncher>>,
    cluster_launcher: Option<Box<dyn ClusterLauncher>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing configuration, e.g. one loaded from TOML.
    pub fn from_configuration(configuration: ClusterConfiguration) -> Self {
        Self {
            configuration,
            ..Default::default()
        }
    }

    pub fn set_custom_config(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.configuration.settings.set(name, value.into());
        self
    }

    pub fn set_custom_config_values<I, S>(
        mut self,
        name: impl Into<String>,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration.settings.set_values(name, values);
        self
    }

    /// Bulk form of [`Builder::set_custom_config`]; values may be single or
    /// multi-valued.
    pub fn set_custom_configs<I, K, V>(
        mut self,
        configs: I,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SettingValue>,
    {
        for (name, value) in configs {
            self.configuration.settings.set(name, value);
        }
        self
    }

    pub fn add_namespace(
        mut self,
        name: impl Into<String>,
    ) -> Self {
        self.configuration.namespaces.push(name.into());
        self
    }

    pub fn add_namespaces<I, S>(
        mut self,
        names: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration.namespaces.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn add_table<I, S>(
        mut self,
        name: impl Into<String>,
        families: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration.tables.push(TableDefinition::new(name, families));
        self
    }

    pub fn add_table_with_versions<I, S>(
        mut self,
        name: impl Into<String>,
        families: I,
        max_versions: u32,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.configuration
            .tables
            .push(TableDefinition::new(name, families).with_max_versions(max_versions));
        self
    }

    pub fn teardown_scope(
        mut self,
        scope: TeardownScope,
    ) -> Self {
        self.configuration.teardown_scope = scope;
        self
    }

    /// Replaces the embedded coordination service.
    pub fn coordination_launcher(
        mut self,
        launcher: Box<dyn CoordinationLauncher>,
    ) -> Self {
        self.coordination_launcher = Some(launcher);
        self
    }

    /// Replaces the embedded storage cluster.
    pub fn cluster_launcher(
        mut self,
        launcher: Box<dyn ClusterLauncher>,
    ) -> Self {
        self.cluster_launcher = Some(launcher);
        self
    }

    /// Returns the immutable configuration. Custom launchers are discarded.
    pub fn build(self) -> ClusterConfiguration {
        self.configuration
    }

    /// Returns an unstarted mini cluster for this configuration.
    pub fn build_cluster(self) -> MiniCluster {
        MiniCluster::with_launchers(
            self.configuration,
            self.coordination_launcher,
            self.cluster_launcher,
        )
    }
}
