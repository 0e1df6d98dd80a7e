//! Adapters between test-framework callbacks and [`MiniCluster`].
//!
//! `PerSuite` starts one cluster in `before_all` and stops it in `after_all`.
//! `PerTest` builds a fresh cluster in every `before_each` and stops it in
//! `after_each`. The callbacks that do not match the scope are no-ops.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::MiniCluster;
use crate::ClusterConfiguration;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownScope {
    #[default]
    PerSuite,
    PerTest,
}

type ClusterFactory = Box<dyn Fn() -> MiniCluster + Send + Sync>;

pub struct Fixture {
    factory: ClusterFactory,
    scope: TeardownScope,
    cluster: MiniCluster,
}

impl Fixture {
    /// `factory` is called once up front and again for every test when the
    /// scope is `PerTest`, since a stopped cluster cannot be restarted.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> MiniCluster + Send + Sync + 'static,
    {
        let cluster = factory();
        Self {
            scope: cluster.teardown_scope(),
            factory: Box::new(factory),
            cluster,
        }
    }

    pub fn from_configuration(configuration: ClusterConfiguration) -> Self {
        Self::new(move || MiniCluster::new(configuration.clone()))
    }

    pub fn scope(&self) -> TeardownScope {
        self.scope
    }

    pub fn cluster(&self) -> &MiniCluster {
        &self.cluster
    }

    pub fn before_all(&mut self) -> Result<()> {
        match self.scope {
            TeardownScope::PerSuite => self.cluster.setup(),
            TeardownScope::PerTest => Ok(()),
        }
    }

    pub fn before_each(&mut self) -> Result<()> {
        match self.scope {
            TeardownScope::PerSuite => Ok(()),
            TeardownScope::PerTest => {
                if self.cluster.state().is_terminal() {
                    debug!("replacing used mini cluster for the next test");
                    self.cluster = (self.factory)();
                }
                self.cluster.setup()
            }
        }
    }

    pub fn after_each(&mut self) -> Result<()> {
        match self.scope {
            TeardownScope::PerSuite => Ok(()),
            TeardownScope::PerTest => self.cluster.teardown(),
        }
    }

    pub fn after_all(&mut self) -> Result<()> {
        match self.scope {
            TeardownScope::PerSuite => self.cluster.teardown(),
            TeardownScope::PerTest => Ok(()),
        }
    }
}

/// Runs `test` against a cluster set up from `configuration` and tears it
/// down afterwards. A panicking test still tears the cluster down on unwind.
pub fn with_mini_cluster<T, F>(
    configuration: ClusterConfiguration,
    test: F,
) -> Result<T>
where
    F: FnOnce(&MiniCluster) -> T,
{
    let mut cluster = MiniCluster::new(configuration);
    cluster.setup()?;
    let output = test(&cluster);
    cluster.teardown()?;
    Ok(output)
}
