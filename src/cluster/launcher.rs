use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;
use nanoid::nanoid;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::info_server;
use super::Store;
use crate::constants::*;
use crate::subsystem::SubsystemHandle;
use crate::CoordinationClient;
use crate::CoordinationError;
use crate::Error;
use crate::Result;
use crate::Settings;

pub(crate) const COMPONENT: &str = "storage cluster";

/// Starts and stops a storage cluster registered with a coordination service.
#[cfg_attr(test, automock)]
pub trait ClusterLauncher: Send + Sync {
    /// Blocks until the cluster is registered and serving.
    fn start(
        &self,
        coordination_address: &str,
        workspace: &Path,
        settings: &Settings,
    ) -> Result<ClusterHandle>;

    fn stop(
        &self,
        handle: ClusterHandle,
    ) -> Result<()>;
}

/// Ports actually bound by the info servers; `None` when disabled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InfoPorts {
    pub master: Option<u16>,
    pub region_server: Option<u16>,
}

/// A running storage cluster.
#[derive(Debug)]
pub struct ClusterHandle {
    cluster_id: String,
    store: Arc<Store>,
    data_dir: Option<PathBuf>,
    info_ports: InfoPorts,
    process: SubsystemHandle,
}

impl ClusterHandle {
    pub fn new(
        store: Arc<Store>,
        data_dir: Option<PathBuf>,
        info_ports: InfoPorts,
        process: SubsystemHandle,
    ) -> Self {
        Self {
            cluster_id: store.cluster_id().to_string(),
            store,
            data_dir,
            info_ports,
            process,
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// On-disk location of the store; `None` for a temporary store.
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    pub fn info_ports(&self) -> InfoPorts {
        self.info_ports
    }

    pub fn into_parts(self) -> (Arc<Store>, SubsystemHandle) {
        (self.store, self.process)
    }
}

/// Runs the storage cluster in-process on a sled store kept under
/// `<workspace>/cluster/data`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedCluster;

impl ClusterLauncher for EmbeddedCluster {
    fn start(
        &self,
        coordination_address: &str,
        workspace: &Path,
        settings: &Settings,
    ) -> Result<ClusterHandle> {
        let master_port = info_port(settings, MASTER_INFO_PORT)?;
        let region_server_port = info_port(settings, REGIONSERVER_INFO_PORT)?;
        let flush_interval = Duration::from_millis(
            settings
                .get_i64_or(CLUSTER_FLUSH_INTERVAL_MS, DEFAULT_FLUSH_INTERVAL_MS)?
                .max(1) as u64,
        );
        let persistent = settings.get_bool_or(CLUSTER_STORAGE_PERSISTENT, true)?;

        let cluster_id = nanoid!(10);
        let startup_error = |e: crate::StoreError| Error::Startup {
            component: COMPONENT,
            reason: e.to_string(),
        };
        let (store, data_dir) = if persistent {
            let dir = workspace.join(CLUSTER_DATA_DIR);
            std::fs::create_dir_all(&dir)?;
            (Store::open(&dir, &cluster_id).map_err(startup_error)?, Some(dir))
        } else {
            (Store::temporary(&cluster_id).map_err(startup_error)?, None)
        };
        let store = Arc::new(store);

        let body_store = store.clone();
        let address = coordination_address.to_string();
        let id = cluster_id.clone();
        let spawned = SubsystemHandle::spawn(
            COMPONENT,
            format!("cluster-{cluster_id}"),
            STARTUP_TIMEOUT,
            SHUTDOWN_TIMEOUT,
            move |ready, mut shutdown| async move {
                run_blocking({
                    let address = address.clone();
                    let id = id.clone();
                    move || register(&address, &id)
                })
                .await?;

                let mut servers: Vec<JoinHandle<()>> = Vec::new();
                let mut ports = InfoPorts::default();
                for (port, role, slot) in [
                    (master_port, "master", &mut ports.master),
                    (region_server_port, "regionserver", &mut ports.region_server),
                ] {
                    if let Some(port) = port {
                        let (addr, server) =
                            info_server::bind(COMPONENT, port, body_store.clone(), role, shutdown.clone())?;
                        debug!(%addr, role, "info server listening");
                        *slot = Some(addr.port());
                        servers.push(tokio::spawn(server));
                    }
                }
                ready.ready(ports);

                let mut ticker = interval(flush_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = ticker.tick() => {
                            if let Err(e) = body_store.flush() {
                                warn!("background flush failed: {}", e);
                            }
                        }
                    }
                }

                if let Err(e) = run_blocking(move || deregister(&address, &id)).await {
                    warn!("deregistration failed: {}", e);
                }
                for server in servers {
                    let _ = server.await;
                }
                body_store.close().map_err(|e| Error::Shutdown {
                    component: COMPONENT,
                    reason: e.to_string(),
                })
            },
        );

        let (process, info_ports) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                let _ = store.close();
                return Err(e);
            }
        };

        info!(
            cluster_id = %cluster_id,
            coordination_address,
            ?info_ports,
            persistent,
            "storage cluster started"
        );
        Ok(ClusterHandle::new(store, data_dir, info_ports, process))
    }

    fn stop(
        &self,
        handle: ClusterHandle,
    ) -> Result<()> {
        let cluster_id = handle.cluster_id().to_string();
        let (store, process) = handle.into_parts();
        let stopped = process.stop();
        // Data operations must fail after stop even if the thread misbehaved.
        if let Err(e) = store.close() {
            warn!(cluster_id = %cluster_id, "failed to close store: {}", e);
        }
        stopped?;
        info!(cluster_id = %cluster_id, "storage cluster stopped");
        Ok(())
    }
}

/// `-1` disables, `0` lets the OS pick, anything else is bound as given.
fn info_port(
    settings: &Settings,
    key: &str,
) -> Result<Option<u16>> {
    match settings.get_i64_or(key, INFO_PORT_DISABLED)? {
        INFO_PORT_DISABLED => Ok(None),
        INFO_PORT_ALLOCATE => Ok(Some(0)),
        port => u16::try_from(port).map(Some).map_err(|_| Error::InvalidSetting {
            key: key.to_string(),
            reason: format!("{port} is not a valid port"),
        }),
    }
}

async fn run_blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> std::result::Result<(), CoordinationError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Startup {
            component: COMPONENT,
            reason: format!("registration task failed: {e}"),
        })?
        .map_err(|e| Error::Startup {
            component: COMPONENT,
            reason: e.to_string(),
        })
}

fn region_server_path(cluster_id: &str) -> String {
    format!("{REGION_SERVER_ZNODE_PREFIX}{cluster_id}-rs0")
}

fn register(
    coordination_address: &str,
    cluster_id: &str,
) -> std::result::Result<(), CoordinationError> {
    let attempts = (COORDINATION_IO_TIMEOUT.as_millis() / REGISTRATION_RETRY_INTERVAL.as_millis()) as usize;
    let mut client =
        CoordinationClient::connect_with_retries(coordination_address, attempts, REGISTRATION_RETRY_INTERVAL)?;
    client.create(MASTER_ZNODE, cluster_id)?;
    client.create(&region_server_path(cluster_id), cluster_id)?;
    debug!(coordination_address, cluster_id, "registered with coordination service");
    Ok(())
}

fn deregister(
    coordination_address: &str,
    cluster_id: &str,
) -> std::result::Result<(), CoordinationError> {
    let mut client = CoordinationClient::connect(coordination_address)?;
    client.delete(&region_server_path(cluster_id))?;
    client.delete(MASTER_ZNODE)?;
    Ok(())
}
