//! Aggregate run state of the whole pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Aggregate run state of the whole pipeline, independent of any single node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
  #[default]
  Idle,
  Running,
  Paused,
  Completed,
  Error,
}

impl PipelineStatus {
  /// Running or paused: an automatic run owns the execution context.
  pub fn is_active(&self) -> bool {
    matches!(self, PipelineStatus::Running | PipelineStatus::Paused)
  }
}

impl fmt::Display for PipelineStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PipelineStatus::Idle => write!(f, "idle"),
      PipelineStatus::Running => write!(f, "running"),
      PipelineStatus::Paused => write!(f, "paused"),
      PipelineStatus::Completed => write!(f, "completed"),
      PipelineStatus::Error => write!(f, "error"),
    }
  }
}
