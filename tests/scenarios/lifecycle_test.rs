use mini_cluster::constants::*;
use mini_cluster::CoordinationClient;
use mini_cluster::LifecycleState;
use mini_cluster::MiniCluster;
use mini_cluster::Result;

/// Passed: a cluster with one namespace and one table
/// Expected: both subsystems reachable while ready, workspace removed after
#[test]
fn test_setup_and_teardown() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder()
        .add_namespace("ns1")
        .add_table("ns1:t1", ["cf"])
        .build_cluster();
    assert_eq!(cluster.state(), LifecycleState::Unstarted);

    cluster.setup()?;
    assert_eq!(cluster.state(), LifecycleState::Ready);

    let address = cluster.coordination_address()?;
    let mut client = CoordinationClient::connect(&address)?;
    assert!(client.ruok()?);
    assert!(client.list("/cluster/")?.iter().any(|p| p == "/cluster/master"));

    let settings = cluster.settings()?;
    assert_eq!(settings.get_str(COORDINATION_QUORUM), Some(address.clone()));
    assert_eq!(settings.get_i64(MASTER_INFO_PORT)?, Some(-1));

    let workspace = cluster.workspace_path().map(|p| p.to_path_buf()).unwrap();
    assert!(workspace.exists());
    let data_dir = cluster.filesystem()?.map(|p| p.to_path_buf()).unwrap();
    assert!(data_dir.starts_with(&workspace));

    cluster.teardown()?;
    assert_eq!(cluster.state(), LifecycleState::Stopped);
    assert!(!workspace.exists());
    assert!(CoordinationClient::connect(&address).is_err());
    Ok(())
}

/// Passed: teardown called twice
/// Expected: second call is rejected, state stays Stopped
#[test]
fn test_teardown_twice() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder().build_cluster();
    cluster.setup()?;
    cluster.teardown()?;

    let e = cluster.teardown().unwrap_err();
    assert!(e.is_invalid_state());
    assert_eq!(cluster.state(), LifecycleState::Stopped);
    Ok(())
}

/// Passed: identical configuration built twice
/// Expected: both clusters reach Ready with the same schema
#[test]
fn test_identical_configurations_start_alike() -> Result<()> {
    crate::enable_logger();

    let configuration = || {
        MiniCluster::builder()
            .add_namespace("ns1")
            .add_table_with_versions("ns1:t1", ["cf"], 3)
            .build()
    };
    assert_eq!(configuration(), configuration());

    for _ in 0..2 {
        let mut cluster = MiniCluster::new(configuration());
        cluster.setup()?;
        let connection = cluster.connection()?;
        let descriptor = connection.table("ns1:t1")?.descriptor()?;
        assert_eq!(descriptor.family(b"cf").map(|f| f.max_versions), Some(3));
        drop(connection);
        cluster.teardown()?;
    }
    Ok(())
}

/// Passed: a table in an undeclared namespace
/// Expected: setup fails, nothing is left behind
#[test]
fn test_failed_setup_releases_everything() {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder().add_table("missing:t1", ["cf"]).build_cluster();
    let e = cluster.setup().unwrap_err();
    assert!(e.to_string().contains("missing:t1"), "{e}");
    assert_eq!(cluster.state(), LifecycleState::Failed);

    let workspace = cluster.workspace_path().unwrap();
    assert!(!workspace.exists());
}
