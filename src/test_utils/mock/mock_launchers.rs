use std::net::SocketAddr;
use std::sync::Arc;

use crate::subsystem::SubsystemHandle;
use crate::ClusterHandle;
use crate::CoordinationHandle;
use crate::InfoPorts;
use crate::MockClusterLauncher;
use crate::MockCoordinationLauncher;
use crate::Store;

pub fn mock_coordination_handle(port: u16) -> CoordinationHandle {
    CoordinationHandle::new(
        SocketAddr::from(([127, 0, 0, 1], port)),
        SubsystemHandle::detached("coordination service"),
    )
}

/// A cluster handle over a temporary store with no thread behind it.
pub fn mock_cluster_handle() -> ClusterHandle {
    ClusterHandle::new(
        Arc::new(Store::temporary("mock-cluster").unwrap()),
        None,
        InfoPorts::default(),
        SubsystemHandle::detached("storage cluster"),
    )
}

/// Starts and stops successfully, any number of times.
pub fn working_coordination_launcher() -> MockCoordinationLauncher {
    let mut launcher = MockCoordinationLauncher::new();
    launcher.expect_start().returning(|port, _| Ok(mock_coordination_handle(port)));
    launcher.expect_stop().returning(|_| Ok(()));
    launcher
}

/// Starts a temporary store; stop closes it like the embedded cluster does.
pub fn working_cluster_launcher() -> MockClusterLauncher {
    let mut launcher = MockClusterLauncher::new();
    launcher.expect_start().returning(|_, _, _| Ok(mock_cluster_handle()));
    launcher.expect_stop().returning(|handle| {
        let (store, _process) = handle.into_parts();
        store.close()?;
        Ok(())
    });
    launcher
}
