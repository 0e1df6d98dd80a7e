use std::collections::HashSet;
use std::thread;

use mini_cluster::MiniCluster;
use mini_cluster::Result;

use crate::common::load_rows;

const CLUSTERS: usize = 3;

/// Passed: several clusters set up at once from separate threads
/// Expected: no shared ports or workspaces, data stays per cluster
#[test]
fn test_concurrent_clusters_are_isolated() -> Result<()> {
    crate::enable_logger();

    let handles = (0..CLUSTERS)
        .map(|i| {
            thread::spawn(move || -> Result<(String, String, u64)> {
                let mut cluster = MiniCluster::builder().add_table("t", ["cf"]).build_cluster();
                cluster.setup()?;

                let connection = cluster.connection()?;
                load_rows(&connection, "t", "cf", i + 1)?;
                let rows = cluster.count_rows("t")?;

                let address = cluster.coordination_address()?;
                let workspace = cluster
                    .workspace_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                drop(connection);
                cluster.teardown()?;
                Ok((address, workspace, rows))
            })
        })
        .collect::<Vec<_>>();

    let mut addresses = HashSet::new();
    let mut workspaces = HashSet::new();
    let mut counts = Vec::new();
    for handle in handles {
        let (address, workspace, rows) = handle.join().expect("cluster thread panicked")?;
        addresses.insert(address);
        workspaces.insert(workspace);
        counts.push(rows);
    }

    assert_eq!(addresses.len(), CLUSTERS);
    assert_eq!(workspaces.len(), CLUSTERS);
    counts.sort();
    assert_eq!(counts, vec![1, 2, 3]);
    Ok(())
}
