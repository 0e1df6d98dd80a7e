use mini_cluster::ClusterConfiguration;
use mini_cluster::Fixture;
use mini_cluster::LifecycleState;
use mini_cluster::Result;
use mini_cluster::TeardownScope;

use crate::common::load_rows;

/// Passed: a per-suite fixture loaded from TOML and shared by two tests
/// Expected: data written by the first test is visible to the second
#[test]
fn test_per_suite_fixture_shares_cluster() -> Result<()> {
    crate::enable_logger();

    let configuration = ClusterConfiguration::from_toml_str(
        r#"
        namespaces = ["suite"]

        [[tables]]
        name = "suite:t1"
        families = ["cf"]
        "#,
    )?;
    let mut fixture = Fixture::from_configuration(configuration);
    assert_eq!(fixture.scope(), TeardownScope::PerSuite);

    fixture.before_all()?;

    fixture.before_each()?;
    {
        let connection = fixture.cluster().connection()?;
        load_rows(&connection, "suite:t1", "cf", 5)?;
    }
    fixture.after_each()?;

    fixture.before_each()?;
    assert_eq!(fixture.cluster().count_rows("suite:t1")?, 5);
    fixture.after_each()?;

    let workspace = fixture.cluster().workspace_path().map(|p| p.to_path_buf()).unwrap();
    fixture.after_all()?;

    assert_eq!(fixture.cluster().state(), LifecycleState::Stopped);
    assert!(!workspace.exists());
    Ok(())
}
