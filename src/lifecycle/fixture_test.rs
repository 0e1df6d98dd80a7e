use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::with_mini_cluster;
use super::Fixture;
use super::LifecycleState;
use super::MiniCluster;
use super::TeardownScope;
use crate::test_utils::working_cluster_launcher;
use crate::test_utils::working_coordination_launcher;
use crate::ClusterConfiguration;

fn fixture(
    scope: TeardownScope,
    built: Arc<AtomicUsize>,
) -> Fixture {
    Fixture::new(move || {
        built.fetch_add(1, Ordering::SeqCst);
        MiniCluster::builder()
            .teardown_scope(scope)
            .coordination_launcher(Box::new(working_coordination_launcher()))
            .cluster_launcher(Box::new(working_cluster_launcher()))
            .build_cluster()
    })
}

#[test]
fn test_default_scope_is_per_suite() {
    assert_eq!(TeardownScope::default(), TeardownScope::PerSuite);
    assert_eq!(
        MiniCluster::new(ClusterConfiguration::default()).teardown_scope(),
        TeardownScope::PerSuite
    );
}

/// Passed: per-suite fixture driven through a suite of two tests
/// Expected: one cluster, ready across both tests, stopped after all
#[test]
fn test_per_suite_fixture() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut fixture = fixture(TeardownScope::PerSuite, built.clone());
    assert_eq!(fixture.scope(), TeardownScope::PerSuite);

    fixture.before_all().unwrap();
    for _ in 0..2 {
        fixture.before_each().unwrap();
        assert_eq!(fixture.cluster().state(), LifecycleState::Ready);
        fixture.after_each().unwrap();
        assert_eq!(fixture.cluster().state(), LifecycleState::Ready);
    }
    fixture.after_all().unwrap();

    assert_eq!(fixture.cluster().state(), LifecycleState::Stopped);
    assert_eq!(built.load(Ordering::SeqCst), 1);
}

/// Passed: per-test fixture driven through a suite of three tests
/// Expected: a fresh cluster per test, each in its own workspace
#[test]
fn test_per_test_fixture() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut fixture = fixture(TeardownScope::PerTest, built.clone());

    fixture.before_all().unwrap();
    assert_eq!(fixture.cluster().state(), LifecycleState::Unstarted);

    let mut workspaces = Vec::new();
    for _ in 0..3 {
        fixture.before_each().unwrap();
        assert_eq!(fixture.cluster().state(), LifecycleState::Ready);
        workspaces.push(fixture.cluster().workspace_path().unwrap().to_path_buf());
        fixture.after_each().unwrap();
        assert_eq!(fixture.cluster().state(), LifecycleState::Stopped);
    }
    fixture.after_all().unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 3);
    workspaces.dedup();
    assert_eq!(workspaces.len(), 3);
    assert!(workspaces.iter().all(|w| !w.exists()));
}

/// Passed: per-test fixture whose next test starts before the last one ended
/// Expected: the live cluster is not replaced; only terminal ones are
#[test]
fn test_per_test_fixture_replaces_only_terminal_clusters() {
    let built = Arc::new(AtomicUsize::new(0));
    let mut fixture = fixture(TeardownScope::PerTest, built.clone());

    fixture.before_each().unwrap();
    assert!(!fixture.cluster().state().is_terminal());
    assert!(fixture.before_each().unwrap_err().is_invalid_state());
    assert_eq!(built.load(Ordering::SeqCst), 1);

    fixture.after_each().unwrap();
    assert!(fixture.cluster().state().is_terminal());
    fixture.before_each().unwrap();
    assert_eq!(built.load(Ordering::SeqCst), 2);
    fixture.after_each().unwrap();
}

#[test]
fn test_scope_from_toml() {
    let configuration = ClusterConfiguration::from_toml_str(r#"teardown_scope = "per_test""#).unwrap();
    assert_eq!(configuration.teardown_scope(), TeardownScope::PerTest);
    assert_eq!(Fixture::from_configuration(configuration).scope(), TeardownScope::PerTest);
}

/// Passed: closure run through the per-test wrapper
/// Expected: cluster ready inside, torn down after, closure output returned
#[test]
fn test_with_mini_cluster() {
    let configuration = MiniCluster::builder().add_table("t", ["cf"]).build();
    let mut seen_workspace = None;

    let rows = with_mini_cluster(configuration, |cluster| {
        assert_eq!(cluster.state(), LifecycleState::Ready);
        seen_workspace = cluster.workspace_path().map(|p| p.to_path_buf());
        cluster.count_rows("t").unwrap()
    })
    .unwrap();

    assert_eq!(rows, 0);
    assert!(!seen_workspace.unwrap().exists());
}
