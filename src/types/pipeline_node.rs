//! A node (pipeline step) on the canvas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{NodeKind, NodeStatus, ParamMap};

/// Render type stored with every node; the canvas only knows one node widget.
pub const NODE_RENDER_TYPE: &str = "workflowNode";

fn default_render_type() -> String {
  NODE_RENDER_TYPE.to_string()
}

/// Highest progress value; a node at this value has finished its work.
pub const MAX_PROGRESS: u8 = 100;

/// Reads any integer progress and clamps it into 0..=100.
fn clamped_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = i64::deserialize(deserializer)?;
  Ok(raw.clamp(0, MAX_PROGRESS as i64) as u8)
}

/// Canvas coordinate. Layout only, no execution semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
  pub x: f64,
  pub y: f64,
}

impl Position {
  pub fn new(x: f64, y: f64) -> Self {
    Self { x, y }
  }
}

/// Step payload: display data plus the execution fields owned by the state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
  pub label: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub status: NodeStatus,
  /// 0..=100; meaningful while running or paused.
  #[serde(default, deserialize_with = "clamped_progress")]
  pub progress: u8,
  #[serde(default)]
  pub parameters: ParamMap,
  #[serde(default)]
  pub metrics: ParamMap,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
  pub start_time: Option<DateTime<Utc>>,
  #[serde(rename = "completedAt", default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<DateTime<Utc>>,
  /// Set while paused so the timeout budget excludes the paused interval.
  #[serde(rename = "pausedAt", default, skip_serializing_if = "Option::is_none")]
  pub paused_at: Option<DateTime<Utc>>,
  /// Produced output, checked by output validation for kinds that require one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub output: Option<Value>,
}

impl NodeData {
  /// Catalogue defaults for `kind`: label, parameters and metrics, idle at 0%.
  pub fn for_kind(kind: NodeKind) -> Self {
    Self {
      label: kind.default_label().to_string(),
      parameters: kind.default_parameters(),
      metrics: kind.default_metrics(),
      kind,
      status: NodeStatus::Idle,
      progress: 0,
      error: None,
      start_time: None,
      completed_at: None,
      paused_at: None,
      output: None,
    }
  }
}

/// A node (pipeline step) on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineNode {
  pub id: String,
  #[serde(rename = "type", default = "default_render_type")]
  pub render_type: String,
  #[serde(default)]
  pub position: Position,
  pub data: NodeData,
}

impl PipelineNode {
  /// New idle node of `kind` with catalogue defaults.
  pub fn new(id: impl Into<String>, kind: NodeKind, position: Position) -> Self {
    Self {
      id: id.into(),
      render_type: default_render_type(),
      position,
      data: NodeData::for_kind(kind),
    }
  }

  pub fn kind(&self) -> &NodeKind {
    &self.data.kind
  }

  pub fn status(&self) -> NodeStatus {
    self.data.status
  }

  pub fn progress(&self) -> u8 {
    self.data.progress
  }

  pub fn is_running(&self) -> bool {
    self.data.status == NodeStatus::Running
  }

  /// Back to {idle, 0}; clears the error and run timestamps, keeps parameters and output.
  pub fn reset(&mut self) {
    self.data.status = NodeStatus::Idle;
    self.data.progress = 0;
    self.data.error = None;
    self.data.start_time = None;
    self.data.completed_at = None;
    self.data.paused_at = None;
  }
}
