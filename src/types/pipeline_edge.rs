//! A directed dependency between two pipeline nodes.

use serde::{Deserialize, Serialize};

/// Curve style used for new edges.
pub const DEFAULT_EDGE_TYPE: &str = "bezier";

fn default_edge_type() -> String {
  DEFAULT_EDGE_TYPE.to_string()
}

fn default_animated() -> bool {
  true
}

/// Stroke styling. Display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeStyle {
  pub stroke: String,
  #[serde(rename = "strokeWidth")]
  pub stroke_width: f64,
  pub opacity: f64,
}

impl Default for EdgeStyle {
  fn default() -> Self {
    Self {
      stroke: "#ED8936".to_string(),
      stroke_width: 2.0,
      opacity: 0.8,
    }
  }
}

/// A directed dependency: `target` may not start before `source` completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEdge {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(rename = "type", default = "default_edge_type")]
  pub edge_type: String,
  #[serde(default = "default_animated")]
  pub animated: bool,
  #[serde(default)]
  pub style: EdgeStyle,
}

impl PipelineEdge {
  /// Edge id for a source/target pair (`e{source}-{target}`).
  pub fn id_for(source: &str, target: &str) -> String {
    format!("e{}-{}", source, target)
  }

  /// Animated bezier edge with the default style.
  pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
    let source = source.into();
    let target = target.into();
    Self {
      id: Self::id_for(&source, &target),
      source,
      target,
      edge_type: default_edge_type(),
      animated: true,
      style: EdgeStyle::default(),
    }
  }

  /// True if either endpoint is `node_id`.
  pub fn touches(&self, node_id: &str) -> bool {
    self.source == node_id || self.target == node_id
  }
}
