//! The remote workflow store seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::types::{PipelineEdge, PipelineGraph, PipelineNode};

/// Backend reply to a run-start notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAck {
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub message: String,
}

impl RunAck {
  /// The backend refused to start (e.g. a flow is already running).
  pub fn is_rejected(&self) -> bool {
    self.status.eq_ignore_ascii_case("error")
  }
}

/// Backend view of whether a flow is executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteRunState {
  Running,
  Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
  pub status: RemoteRunState,
  #[serde(default)]
  pub message: String,
}

/// Where pipeline graphs are loaded from and saved to.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
  async fn load_nodes(&self) -> Result<Vec<PipelineNode>, StoreError>;

  async fn load_edges(&self) -> Result<Vec<PipelineEdge>, StoreError>;

  /// Replaces the stored graph with `graph`.
  async fn replace_graph(&self, graph: &PipelineGraph) -> Result<(), StoreError>;

  /// Tells the backend a pipeline run has begun.
  async fn notify_run_started(&self) -> Result<RunAck, StoreError>;

  async fn run_status(&self) -> Result<RunStatus, StoreError>;
}
