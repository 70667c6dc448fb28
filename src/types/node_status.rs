//! Status of a single pipeline node.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Status of a single pipeline node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
  #[default]
  Idle,
  Queued,
  Running,
  Completed,
  Failed,
  Stopped,
  Paused,
}

impl NodeStatus {
  /// True once the node reached a state it cannot leave without a reset.
  pub fn is_terminal(&self) -> bool {
    matches!(
      self,
      NodeStatus::Completed | NodeStatus::Failed | NodeStatus::Stopped
    )
  }
}

impl fmt::Display for NodeStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      NodeStatus::Idle => write!(f, "idle"),
      NodeStatus::Queued => write!(f, "queued"),
      NodeStatus::Running => write!(f, "running"),
      NodeStatus::Completed => write!(f, "completed"),
      NodeStatus::Failed => write!(f, "failed"),
      NodeStatus::Stopped => write!(f, "stopped"),
      NodeStatus::Paused => write!(f, "paused"),
    }
  }
}
