use mini_cluster::constants::*;
use mini_cluster::MiniCluster;
use mini_cluster::Result;

use crate::common::http_get;

/// Passed: master info port set to 0
/// Expected: an OS-picked port serving status, region server info stays off
#[test]
fn test_master_info_server_on_ephemeral_port() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder()
        .add_namespace("ns1")
        .add_table("ns1:t1", ["cf"])
        .set_custom_config(MASTER_INFO_PORT, "0")
        .build_cluster();
    cluster.setup()?;

    let ports = cluster.info_ports()?;
    assert!(ports.region_server.is_none());
    let port = ports.master.unwrap();
    assert_ne!(port, 0);

    let response = http_get(port, "/status")?;
    assert!(response.starts_with("HTTP/1.1 200") || response.starts_with("HTTP/1.0 200"), "{response}");
    assert!(response.contains(r#""role":"master""#), "{response}");
    assert!(response.contains(r#""tables":1"#), "{response}");

    let metrics = http_get(port, "/metrics")?;
    assert!(metrics.contains("200"), "{metrics}");

    cluster.teardown()?;
    assert!(http_get(port, "/status").is_err());
    Ok(())
}

/// Passed: default settings
/// Expected: no info server bound
#[test]
fn test_info_servers_disabled_by_default() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder().build_cluster();
    cluster.setup()?;
    let ports = cluster.info_ports()?;
    assert_eq!(ports.master, None);
    assert_eq!(ports.region_server, None);
    cluster.teardown()?;
    Ok(())
}
