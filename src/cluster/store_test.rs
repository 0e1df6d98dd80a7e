use super::store::decode_key;
use super::store::encode_cell_key;
use super::metrics::gather_text;
use super::ColumnFamilyDescriptor;
use super::Store;
use super::TableDescriptor;
use super::TableName;
use crate::StoreError;

fn table(name: &str) -> TableName {
    name.parse().unwrap()
}

fn store_with_table(
    name: &str,
    families: &[&str],
    max_versions: Option<u32>,
) -> Store {
    let store = Store::temporary("store-test").unwrap();
    let name = table(name);
    if !store.namespace_exists(name.namespace()).unwrap() {
        store.create_namespace(name.namespace()).unwrap();
    }
    store
        .create_table(&TableDescriptor::new(name).with_families(families.iter().copied(), max_versions))
        .unwrap();
    store
}

#[test]
fn test_default_namespace_always_exists() {
    let store = Store::temporary("store-test").unwrap();
    assert!(store.namespace_exists("default").unwrap());
    assert_eq!(store.list_namespaces().unwrap(), vec!["default".to_string()]);
}

#[test]
fn test_create_namespace_twice_fails() {
    let store = Store::temporary("store-test").unwrap();
    store.create_namespace("ns1").unwrap();
    assert!(matches!(
        store.create_namespace("ns1"),
        Err(StoreError::NamespaceExists(_))
    ));
}

/// Passed: table in a namespace that was never created
/// Expected: NamespaceNotFound, no descriptor written
#[test]
fn test_create_table_requires_namespace() {
    let store = Store::temporary("store-test").unwrap();
    let descriptor = TableDescriptor::new(table("ns1:t1")).with_families(["cf"], None);

    assert!(matches!(
        store.create_table(&descriptor),
        Err(StoreError::NamespaceNotFound(ns)) if ns == "ns1"
    ));
    assert!(!store.table_exists(&table("ns1:t1")).unwrap());
}

#[test]
fn test_create_table_validation() {
    let store = Store::temporary("store-test").unwrap();
    assert!(matches!(
        store.create_table(&TableDescriptor::new(table("t"))),
        Err(StoreError::NoColumnFamilies(_))
    ));

    let descriptor = TableDescriptor::new(table("t")).with_families(["cf"], None);
    store.create_table(&descriptor).unwrap();
    assert!(matches!(store.create_table(&descriptor), Err(StoreError::TableExists(_))));
    assert_eq!(store.table_descriptor(&table("t")).unwrap(), descriptor);
    assert_eq!(store.list_tables().unwrap(), vec![table("t")]);
}

/// Passed: families with zero versions, a duplicate name and an empty name
/// Expected: InvalidColumnFamily and no table, so no write can be pruned away
#[test]
fn test_create_table_rejects_invalid_families() {
    let store = Store::temporary("store-test").unwrap();
    let mut zero_versions = ColumnFamilyDescriptor::new("cf");
    zero_versions.max_versions = 0;

    let cases = [
        TableDescriptor::new(table("t")).with_family(zero_versions),
        TableDescriptor::new(table("t")).with_families(["cf", "cf"], None),
        TableDescriptor::new(table("t")).with_families([""], None),
    ];
    for descriptor in &cases {
        assert!(
            matches!(store.create_table(descriptor), Err(StoreError::InvalidColumnFamily { .. })),
            "{descriptor:?} should be rejected"
        );
        assert!(!store.table_exists(&table("t")).unwrap());
    }
}

#[test]
fn test_delete_namespace_with_tables_fails() {
    let store = store_with_table("ns1:t1", &["cf"], None);
    assert!(matches!(
        store.delete_namespace("ns1"),
        Err(StoreError::NamespaceNotEmpty(_))
    ));
    store.delete_table(&table("ns1:t1")).unwrap();
    store.delete_namespace("ns1").unwrap();
    assert!(!store.namespace_exists("ns1").unwrap());
}

#[test]
fn test_put_get_latest_value() {
    let store = store_with_table("t", &["cf"], None);
    let t = table("t");

    let first = store.put(&t, b"r1", b"cf", b"q", b"v1").unwrap();
    let second = store.put(&t, b"r1", b"cf", b"q", b"v2").unwrap();
    assert!(second > first);

    let row = store.get(&t, b"r1", &[], 1).unwrap().unwrap();
    assert_eq!(row.value(b"cf", b"q"), Some(&b"v2"[..]));
    assert_eq!(row.cells.len(), 1);
    assert!(store.get(&t, b"missing", &[], 1).unwrap().is_none());
}

/// Passed: four writes to a family keeping two versions
/// Expected: only the two newest versions survive, newest first
#[test]
fn test_versions_beyond_limit_are_pruned() {
    let store = store_with_table("t", &["cf"], Some(2));
    let t = table("t");
    for v in ["v1", "v2", "v3", "v4"] {
        store.put(&t, b"r", b"cf", b"q", v.as_bytes()).unwrap();
    }

    let row = store.get(&t, b"r", &[], 10).unwrap().unwrap();
    let values: Vec<&[u8]> = row.versions(b"cf", b"q").iter().map(|c| c.value.as_slice()).collect();
    assert_eq!(values, vec![&b"v4"[..], &b"v3"[..]]);
}

#[test]
fn test_get_restricts_columns() {
    let store = store_with_table("t", &["a", "b"], None);
    let t = table("t");
    store.put(&t, b"r", b"a", b"x", b"1").unwrap();
    store.put(&t, b"r", b"a", b"y", b"2").unwrap();
    store.put(&t, b"r", b"b", b"x", b"3").unwrap();

    let family_only = store.get(&t, b"r", &[(b"a".to_vec(), None)], 1).unwrap().unwrap();
    assert_eq!(family_only.cells.len(), 2);

    let one_column = store
        .get(&t, b"r", &[(b"b".to_vec(), Some(b"x".to_vec()))], 1)
        .unwrap()
        .unwrap();
    assert_eq!(one_column.cells.len(), 1);
    assert_eq!(one_column.value(b"b", b"x"), Some(&b"3"[..]));
}

#[test]
fn test_put_unknown_family_fails() {
    let store = store_with_table("t", &["cf"], None);
    assert!(matches!(
        store.put(&table("t"), b"r", b"nope", b"q", b"v"),
        Err(StoreError::FamilyNotFound { .. })
    ));
}

#[test]
fn test_scan_and_count_rows() {
    let store = store_with_table("t", &["a", "b"], Some(3));
    let t = table("t");
    for i in 0..10 {
        let row = format!("row-{i:03}");
        store.put(&t, row.as_bytes(), b"a", b"q", b"old").unwrap();
        store.put(&t, row.as_bytes(), b"a", b"q", b"new").unwrap();
        if i % 2 == 0 {
            store.put(&t, row.as_bytes(), b"b", b"q", b"x").unwrap();
        }
    }

    let rows = store.scan(&t).unwrap();
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r.value(b"a", b"q") == Some(&b"new"[..])));
    assert_eq!(rows[0].versions(b"a", b"q").len(), 1);

    assert_eq!(store.count_rows(&t, &[]).unwrap(), 10);
    assert_eq!(store.count_rows(&t, &[b"b".to_vec()]).unwrap(), 5);
}

#[test]
fn test_delete_row_truncate_and_delete_data() {
    let store = store_with_table("t", &["cf"], None);
    let t = table("t");
    for row in ["a", "b", "c"] {
        store.put(&t, row.as_bytes(), b"cf", b"q", b"v").unwrap();
    }

    store.delete_row(&t, b"a").unwrap();
    store.delete_row(&t, b"missing").unwrap();
    assert_eq!(store.count_rows(&t, &[]).unwrap(), 2);

    store.truncate_table(&t).unwrap();
    assert_eq!(store.count_rows(&t, &[]).unwrap(), 0);
    assert!(store.table_exists(&t).unwrap());

    store.put(&t, b"d", b"cf", b"q", b"v").unwrap();
    store.delete_table_data(&t).unwrap();
    assert_eq!(store.count_rows(&t, &[]).unwrap(), 0);
}

#[test]
fn test_missing_table_operations_fail() {
    let store = Store::temporary("store-test").unwrap();
    let t = table("nope");
    assert!(matches!(store.count_rows(&t, &[]), Err(StoreError::TableNotFound(_))));
    assert!(matches!(store.truncate_table(&t), Err(StoreError::TableNotFound(_))));
    assert!(matches!(store.delete_table(&t), Err(StoreError::TableNotFound(_))));
}

/// Passed: operations after close
/// Expected: ClusterStopped; closing again is fine
#[test]
fn test_closed_store_rejects_operations() {
    let store = store_with_table("t", &["cf"], None);
    store.close().unwrap();
    assert!(!store.is_open());
    assert!(matches!(
        store.count_rows(&table("t"), &[]),
        Err(StoreError::ClusterStopped)
    ));
    assert!(matches!(store.list_namespaces(), Err(StoreError::ClusterStopped)));
    store.close().unwrap();
}

#[test]
fn test_persistent_store_reopens() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::open(dir.path(), "persisted").unwrap();
        store.create_namespace("ns1").unwrap();
        store.close().unwrap();
    }
    let store = Store::open(dir.path(), "persisted").unwrap();
    assert!(store.namespace_exists("ns1").unwrap());
}

#[test]
fn test_cell_key_layout() {
    let key = encode_cell_key(b"row", b"cf", b"q", 42);
    assert_eq!(decode_key(&key), Some((&b"row"[..], &b"cf"[..], &b"q"[..], 42)));
    assert!(decode_key(b"junk").is_none());

    // Newer versions sort first.
    assert!(encode_cell_key(b"row", b"cf", b"q", 43) < key);
}

/// Passed: store used then closed
/// Expected: its labelled metric series are gone from the registry
#[test]
fn test_close_removes_metric_series() {
    let store = Store::temporary("metrics-cleanup-store").unwrap();
    store
        .create_table(&TableDescriptor::new(table("t")).with_families(["cf"], None))
        .unwrap();
    let label = format!("cluster_id=\"{}\"", store.cluster_id());
    assert!(gather_text().contains(&label));

    store.close().unwrap();
    assert!(!gather_text().contains(&label));
}
