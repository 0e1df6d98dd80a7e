use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tokio::net::TcpListener;
use tracing::info;

use super::server::CoordinationServer;
use crate::constants::COORDINATION_DIR;
use crate::constants::COORDINATION_IO_TIMEOUT;
use crate::constants::COORDINATION_TXN_LOG;
use crate::constants::SHUTDOWN_TIMEOUT;
use crate::constants::STARTUP_TIMEOUT;
use crate::net::is_server_ready;
use crate::net::LOCALHOST;
use crate::subsystem::SubsystemHandle;
use crate::Error;
use crate::Result;

pub(crate) const COMPONENT: &str = "coordination service";

/// Starts and stops a coordination service bound to a given port.
#[cfg_attr(test, automock)]
pub trait CoordinationLauncher: Send + Sync {
    /// Blocks until the service accepts connections on `port`.
    fn start(
        &self,
        port: u16,
        workspace: &Path,
    ) -> Result<CoordinationHandle>;

    fn stop(
        &self,
        handle: CoordinationHandle,
    ) -> Result<()>;
}

/// A running coordination service.
#[derive(Debug)]
pub struct CoordinationHandle {
    address: SocketAddr,
    process: SubsystemHandle,
}

impl CoordinationHandle {
    pub fn new(
        address: SocketAddr,
        process: SubsystemHandle,
    ) -> Self {
        Self { address, process }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn into_process(self) -> SubsystemHandle {
        self.process
    }
}

/// Runs the coordination service in-process, keeping its transaction log
/// under `<workspace>/coordination`.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedCoordination;

impl CoordinationLauncher for EmbeddedCoordination {
    fn start(
        &self,
        port: u16,
        workspace: &Path,
    ) -> Result<CoordinationHandle> {
        let dir = workspace.join(COORDINATION_DIR);
        std::fs::create_dir_all(&dir)?;
        let server = Arc::new(CoordinationServer::new(dir.join(COORDINATION_TXN_LOG)));

        let (process, address) = SubsystemHandle::spawn(
            COMPONENT,
            format!("coordination-{port}"),
            STARTUP_TIMEOUT,
            SHUTDOWN_TIMEOUT,
            move |ready, shutdown| async move {
                let listener = TcpListener::bind((LOCALHOST, port)).await.map_err(|e| Error::Startup {
                    component: COMPONENT,
                    reason: format!("failed to bind port {port}: {e}"),
                })?;
                let address = listener.local_addr()?;
                ready.ready(address);
                server.serve(listener, shutdown).await;
                Ok(())
            },
        )?;

        if !is_server_ready(&address, COORDINATION_IO_TIMEOUT) {
            let _ = process.stop();
            return Err(Error::Startup {
                component: COMPONENT,
                reason: format!("no connection accepted at {address}"),
            });
        }

        info!(%address, dir = %dir.display(), "coordination service started");
        Ok(CoordinationHandle::new(address, process))
    }

    fn stop(
        &self,
        handle: CoordinationHandle,
    ) -> Result<()> {
        let address = handle.address();
        handle.into_process().stop()?;
        info!(%address, "coordination service stopped");
        Ok(())
    }
}
