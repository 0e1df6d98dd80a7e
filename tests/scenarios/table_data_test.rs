use mini_cluster::Get;
use mini_cluster::MiniCluster;
use mini_cluster::Put;
use mini_cluster::Result;

use crate::common::load_rows;
use crate::common::ROW_COUNT;

/// Passed: 100 rows written into a provisioned table
/// Expected: all counted while ready, counting refused after teardown
#[test]
fn test_rows_survive_until_teardown() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder()
        .add_namespace("ns1")
        .add_table("ns1:t1", ["cf"])
        .build_cluster();
    cluster.setup()?;

    let connection = cluster.connection()?;
    load_rows(&connection, "ns1:t1", "cf", ROW_COUNT)?;
    assert_eq!(cluster.count_rows("ns1:t1")?, ROW_COUNT as u64);

    let table = connection.table("ns1:t1")?;
    let row = table.get(&Get::new("row-042"))?.unwrap();
    assert_eq!(row.value(b"cf", b"q"), Some(b"value-42".as_slice()));

    let workspace = cluster.workspace_path().map(|p| p.to_path_buf()).unwrap();
    drop(table);
    drop(connection);
    cluster.teardown()?;

    assert!(!workspace.exists());
    assert!(cluster.count_rows("ns1:t1").unwrap_err().is_invalid_state());
    Ok(())
}

/// Passed: tables created, emptied and dropped through the facade
/// Expected: row counts and table presence follow each call
#[test]
fn test_table_management_facade() -> Result<()> {
    crate::enable_logger();

    let mut cluster = MiniCluster::builder().build_cluster();
    cluster.setup()?;

    cluster.create_namespace("app")?;
    cluster.create_table("app:events", &["a", "b"])?;
    cluster.create_table_with_versions("app:history", "h", 2)?;

    let connection = cluster.connection()?;
    let events = connection.table("app:events")?;
    for i in 0..10 {
        let mut put = Put::new(format!("r{i}")).add_column("a", "q", "1");
        if i % 2 == 0 {
            put = put.add_column("b", "q", "2");
        }
        events.put(&put)?;
    }
    assert_eq!(cluster.count_rows_in(&events)?, 10);
    assert_eq!(cluster.count_rows_in_families(&events, &["b"])?, 5);

    let history = connection.table("app:history")?;
    for v in ["v1", "v2", "v3"] {
        history.put(&Put::new("r").add_column("h", "q", v))?;
    }
    let row = history.get(&Get::new("r").max_versions(5))?.unwrap();
    let versions = row.versions(b"h", b"q");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].value, b"v3");

    cluster.truncate_table("app:events")?;
    assert_eq!(cluster.count_rows("app:events")?, 0);
    assert!(connection.table("app:events").is_ok());

    cluster.delete_table("app:history")?;
    assert!(connection.table("app:history").is_err());

    drop(events);
    drop(history);
    drop(connection);
    cluster.teardown()?;
    Ok(())
}
