//! Serialized pipeline graph: export/import files and checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{PipelineEdge, PipelineGraph, PipelineNode, PipelineVersion};

/// Export file contents: `{nodes, edges, version, exportedAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSnapshot {
  pub nodes: Vec<PipelineNode>,
  pub edges: Vec<PipelineEdge>,
  /// Files without a version import as `1.0.0`.
  #[serde(default)]
  pub version: PipelineVersion,
  #[serde(rename = "exportedAt", default, skip_serializing_if = "Option::is_none")]
  pub exported_at: Option<DateTime<Utc>>,
}

impl PipelineSnapshot {
  pub fn capture(graph: &PipelineGraph, version: PipelineVersion, at: DateTime<Utc>) -> Self {
    Self {
      nodes: graph.nodes().to_vec(),
      edges: graph.edges().to_vec(),
      version,
      exported_at: Some(at),
    }
  }

  /// File name used for exports: `pipeline-{version}-{YYYY-MM-DD}.json`.
  pub fn file_name(&self) -> String {
    let date = self.exported_at.unwrap_or_else(Utc::now);
    format!("pipeline-{}-{}.json", self.version, date.format("%Y-%m-%d"))
  }
}

fn new_checkpoint_id() -> String {
  Uuid::new_v4().to_string()
}

/// A saved copy of the graph usable for manual rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
  #[serde(default = "new_checkpoint_id")]
  pub id: String,
  pub nodes: Vec<PipelineNode>,
  pub edges: Vec<PipelineEdge>,
  #[serde(default)]
  pub version: PipelineVersion,
  #[serde(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
}

impl Checkpoint {
  pub fn capture(graph: &PipelineGraph, version: PipelineVersion, at: DateTime<Utc>) -> Self {
    Self {
      id: new_checkpoint_id(),
      nodes: graph.nodes().to_vec(),
      edges: graph.edges().to_vec(),
      version,
      created_at: at,
    }
  }
}

/// Most checkpoints kept; older ones are dropped first.
pub const MAX_CHECKPOINTS: usize = 10;

/// Capped, oldest-first list of checkpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckpointHistory {
  checkpoints: Vec<Checkpoint>,
}

impl CheckpointHistory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends `cp`, dropping the oldest entries beyond [MAX_CHECKPOINTS].
  pub fn push(&mut self, cp: Checkpoint) {
    self.checkpoints.push(cp);
    if self.checkpoints.len() > MAX_CHECKPOINTS {
      let excess = self.checkpoints.len() - MAX_CHECKPOINTS;
      self.checkpoints.drain(..excess);
    }
  }

  pub fn get(&self, id: &str) -> Option<&Checkpoint> {
    self.checkpoints.iter().find(|c| c.id == id)
  }

  pub fn latest(&self) -> Option<&Checkpoint> {
    self.checkpoints.last()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Checkpoint> {
    self.checkpoints.iter()
  }

  pub fn len(&self) -> usize {
    self.checkpoints.len()
  }

  pub fn is_empty(&self) -> bool {
    self.checkpoints.is_empty()
  }
}
