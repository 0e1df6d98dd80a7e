//! The mini cluster orchestrator.
//!
//! `setup` creates a scoped workspace, starts the coordination service on a
//! freshly allocated port, starts the storage cluster against it and
//! provisions the declared schema. `teardown` stops the cluster, stops the
//! coordination service and deletes the workspace, attempting every step and
//! reporting every failure.
//!
//! One `MiniCluster` has one owner; lifecycle calls take `&mut self`.

use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::LifecycleState;
use crate::constants::COORDINATION_QUORUM;
use crate::constants::WORKSPACE_PREFIX;
use crate::net::allocate_port;
use crate::workspace::ScopedWorkspace;
use crate::Admin;
use crate::Builder;
use crate::ClusterConfiguration;
use crate::ClusterHandle;
use crate::ClusterLauncher;
use crate::Connection;
use crate::CoordinationHandle;
use crate::CoordinationLauncher;
use crate::EmbeddedCluster;
use crate::EmbeddedCoordination;
use crate::Error;
use crate::InfoPorts;
use crate::Result;
use crate::SchemaProvisioner;
use crate::Settings;
use crate::Table;
use crate::TableName;
use crate::TeardownErrors;
use crate::TeardownScope;

/// Resources held between a successful setup and teardown.
#[derive(Debug, Default)]
struct RuntimeHandle {
    workspace: Option<ScopedWorkspace>,
    coordination: Option<CoordinationHandle>,
    cluster: Option<ClusterHandle>,
    settings: Settings,
}

pub struct MiniCluster {
    configuration: ClusterConfiguration,
    coordination_launcher: Box<dyn CoordinationLauncher>,
    cluster_launcher: Box<dyn ClusterLauncher>,
    state: LifecycleState,
    runtime: RuntimeHandle,
    workspace_path: Option<PathBuf>,
}

impl std::fmt::Debug for MiniCluster {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("MiniCluster")
            .field("state", &self.state)
            .field("workspace_path", &self.workspace_path)
            .field("runtime", &self.runtime)
            .finish()
    }
}

impl MiniCluster {
    pub fn builder() -> Builder {
        Builder::new()
    }

    /// An unstarted mini cluster running the embedded coordination service
    /// and storage cluster.
    pub fn new(configuration: ClusterConfiguration) -> Self {
        Self::with_launchers(configuration, None, None)
    }

    pub(crate) fn with_launchers(
        configuration: ClusterConfiguration,
        coordination_launcher: Option<Box<dyn CoordinationLauncher>>,
        cluster_launcher: Option<Box<dyn ClusterLauncher>>,
    ) -> Self {
        Self {
            configuration,
            coordination_launcher: coordination_launcher.unwrap_or_else(|| Box::new(EmbeddedCoordination)),
            cluster_launcher: cluster_launcher.unwrap_or_else(|| Box::new(EmbeddedCluster)),
            state: LifecycleState::Unstarted,
            runtime: RuntimeHandle::default(),
            workspace_path: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn configuration(&self) -> &ClusterConfiguration {
        &self.configuration
    }

    pub fn teardown_scope(&self) -> TeardownScope {
        self.configuration.teardown_scope()
    }

    // -
    // Lifecycle

    /// Brings the cluster to `Ready`.
    ///
    /// Any failure leaves the instance `Failed` after releasing whatever was
    /// already acquired; the original error is returned. A failed instance
    /// cannot be set up again.
    pub fn setup(&mut self) -> Result<()> {
        if self.state != LifecycleState::Unstarted {
            return Err(Error::invalid_state("set up", self.state));
        }
        self.state = LifecycleState::Starting;
        info!("starting mini cluster");

        match self.start() {
            Ok(()) => {
                self.state = LifecycleState::Ready;
                info!(
                    workspace = ?self.workspace_path,
                    coordination = %self.runtime.settings.get_str(COORDINATION_QUORUM).unwrap_or_default(),
                    "mini cluster ready"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "mini cluster setup failed, releasing acquired resources");
                for cleanup in self.release_all() {
                    warn!(error = %cleanup, "cleanup after failed setup");
                }
                self.state = LifecycleState::Failed;
                Err(e)
            }
        }
    }

    fn start(&mut self) -> Result<()> {
        self.configuration.validate()?;

        let workspace = ScopedWorkspace::create(WORKSPACE_PREFIX)?;
        let workspace_path = workspace.path().to_path_buf();
        self.workspace_path = Some(workspace_path.clone());
        self.runtime.workspace = Some(workspace);

        let port = allocate_port()?;
        let coordination = self.coordination_launcher.start(port, &workspace_path)?;
        let coordination_address = coordination.address().to_string();
        self.runtime.coordination = Some(coordination);

        let mut settings = Settings::with_orchestrator_defaults(self.configuration.settings());
        settings.set(COORDINATION_QUORUM, coordination_address.as_str());
        let cluster = self
            .cluster_launcher
            .start(&coordination_address, &workspace_path, &settings)?;
        let store = cluster.store().clone();
        self.runtime.cluster = Some(cluster);
        self.runtime.settings = settings;

        SchemaProvisioner::new(Admin::new(store, Arc::new(AtomicBool::new(false)))).provision(&self.configuration)
    }

    /// Stops the cluster, stops the coordination service and deletes the
    /// workspace. Every step is attempted; if any failed, all failures are
    /// returned together and the instance ends `Failed`, otherwise `Stopped`.
    pub fn teardown(&mut self) -> Result<()> {
        if self.state != LifecycleState::Ready {
            return Err(Error::invalid_state("tear down", self.state));
        }
        self.state = LifecycleState::Stopping;
        info!("stopping mini cluster");

        let errors = self.release_all();
        if errors.is_empty() {
            self.state = LifecycleState::Stopped;
            info!("mini cluster stopped");
            Ok(())
        } else {
            self.state = LifecycleState::Failed;
            let errors = TeardownErrors::new(errors);
            error!(%errors, "mini cluster teardown incomplete");
            Err(errors.into())
        }
    }

    fn release_all(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();

        if let Some(cluster) = self.runtime.cluster.take() {
            if let Err(e) = self.cluster_launcher.stop(cluster) {
                warn!(error = %e, "failed to stop storage cluster");
                errors.push(e);
            }
        }
        if let Some(coordination) = self.runtime.coordination.take() {
            if let Err(e) = self.coordination_launcher.stop(coordination) {
                warn!(error = %e, "failed to stop coordination service");
                errors.push(e);
            }
        }
        if let Some(workspace) = self.runtime.workspace.take() {
            if let Err(e) = workspace.destroy() {
                warn!(error = %e, "failed to delete workspace");
                errors.push(e);
            }
        }
        errors
    }

    // -
    // Ready-only accessors

    fn ensure_ready(
        &self,
        operation: &'static str,
    ) -> Result<()> {
        if !self.state.is_ready() {
            return Err(Error::invalid_state(operation, self.state));
        }
        Ok(())
    }

    fn cluster(
        &self,
        operation: &'static str,
    ) -> Result<&ClusterHandle> {
        self.ensure_ready(operation)?;
        self.runtime
            .cluster
            .as_ref()
            .ok_or(Error::invalid_state(operation, self.state))
    }

    fn admin(
        &self,
        operation: &'static str,
    ) -> Result<Admin> {
        let store = self.cluster(operation)?.store().clone();
        Ok(Admin::new(store, Arc::new(AtomicBool::new(false))))
    }

    fn provisioner(
        &self,
        operation: &'static str,
    ) -> Result<SchemaProvisioner> {
        Ok(SchemaProvisioner::new(self.admin(operation)?))
    }

    /// `host:port` of the coordination service.
    pub fn coordination_address(&self) -> Result<String> {
        self.ensure_ready("get the coordination address")?;
        self.runtime
            .coordination
            .as_ref()
            .map(|c| c.address().to_string())
            .ok_or(Error::invalid_state("get the coordination address", self.state))
    }

    /// The scoped workspace, once created. Still reported after teardown so
    /// callers can check it is gone.
    pub fn workspace_path(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }

    /// Settings the cluster was started with: defaults, custom settings and
    /// the coordination quorum.
    pub fn settings(&self) -> Result<&Settings> {
        self.ensure_ready("read settings")?;
        Ok(&self.runtime.settings)
    }

    /// Directory the storage cluster persists to; `None` for a temporary store.
    pub fn filesystem(&self) -> Result<Option<&Path>> {
        Ok(self.cluster("get the filesystem")?.data_dir())
    }

    pub fn info_ports(&self) -> Result<InfoPorts> {
        Ok(self.cluster("get info ports")?.info_ports())
    }

    /// A new client connection; closed when dropped.
    pub fn connection(&self) -> Result<Connection> {
        let store = self.cluster("open a connection")?.store().clone();
        let address = self.coordination_address()?;
        Connection::open(&address, store, &self.runtime.settings)
    }

    // -
    // Convenience facade

    pub fn create_namespace(
        &self,
        name: &str,
    ) -> Result<()> {
        self.provisioner("create a namespace")?.create_namespace(name)
    }

    pub fn create_table<S: AsRef<str>>(
        &self,
        name: &str,
        families: &[S],
    ) -> Result<()> {
        self.provisioner("create a table")?.create_table(name, families, None)
    }

    pub fn create_table_with_versions(
        &self,
        name: &str,
        family: &str,
        max_versions: u32,
    ) -> Result<()> {
        self.provisioner("create a table")?
            .create_table(name, &[family], Some(max_versions))
    }

    pub fn create_table_with_family_versions<S: AsRef<str>>(
        &self,
        name: &str,
        families: &[(S, u32)],
    ) -> Result<()> {
        self.provisioner("create a table")?
            .create_table_with_family_versions(name, families)
    }

    pub fn delete_table(
        &self,
        name: &str,
    ) -> Result<()> {
        let table: TableName = name.parse()?;
        Ok(self.admin("delete a table")?.delete_table(&table)?)
    }

    /// Drops every row, keeping the table and its families.
    pub fn truncate_table(
        &self,
        name: &str,
    ) -> Result<()> {
        let table: TableName = name.parse()?;
        Ok(self.admin("truncate a table")?.truncate_table(&table)?)
    }

    pub fn delete_table_data(
        &self,
        name: &str,
    ) -> Result<()> {
        let table: TableName = name.parse()?;
        Ok(self.admin("delete table data")?.delete_table_data(&table)?)
    }

    /// Full scan; meant for small fixtures.
    pub fn count_rows(
        &self,
        name: &str,
    ) -> Result<u64> {
        let store = self.cluster("count rows")?.store().clone();
        let table: TableName = name.parse()?;
        Ok(store.count_rows(&table, &[])?)
    }

    pub fn count_rows_in(
        &self,
        table: &Table,
    ) -> Result<u64> {
        self.ensure_ready("count rows")?;
        Ok(table.count_rows()?)
    }

    pub fn count_rows_in_families<S: AsRef<str>>(
        &self,
        table: &Table,
        families: &[S],
    ) -> Result<u64> {
        self.ensure_ready("count rows")?;
        Ok(table.count_rows_in_families(families)?)
    }
}

impl Drop for MiniCluster {
    fn drop(&mut self) {
        if self.state.is_ready() {
            warn!("mini cluster dropped while ready, tearing down");
            if let Err(e) = self.teardown() {
                error!(error = %e, "teardown on drop failed");
            }
        }
    }
}
