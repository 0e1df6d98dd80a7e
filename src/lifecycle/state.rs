use std::fmt;

/// Where a [`crate::MiniCluster`] is in its life.
///
/// ```text
/// Unstarted -> Starting -> Ready -> Stopping -> Stopped
///                 |                    |
///                 +------> Failed <----+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    Unstarted,
    Starting,
    Ready,
    Stopping,
    Stopped,
    Failed,
}

impl LifecycleState {
    pub fn is_ready(self) -> bool {
        self == LifecycleState::Ready
    }

    /// No further lifecycle call is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Stopped | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            LifecycleState::Unstarted => "unstarted",
            LifecycleState::Starting => "starting",
            LifecycleState::Ready => "ready",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Failed => "failed",
        };
        f.write_str(s)
    }
}
