//! Wire shapes exchanged with the workflow backend.
//!
//! The backend stores positions as integers and edge endpoints as integer
//! node ids, and may hand back empty or partial JSON columns, so loading goes
//! through these lenient shapes before becoming graph types.

use serde::{Deserialize, Serialize};

use crate::types::{
  DEFAULT_EDGE_TYPE, EdgeStyle, MAX_PROGRESS, NODE_RENDER_TYPE, NodeData, NodeKind, NodeStatus,
  ParamMap, PipelineEdge, PipelineGraph, PipelineNode, Position,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WirePosition {
  pub x: f64,
  pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireNodeData {
  #[serde(default)]
  pub label: String,
  #[serde(rename = "type")]
  pub kind: NodeKind,
  #[serde(default)]
  pub status: Option<NodeStatus>,
  #[serde(default)]
  pub progress: Option<i64>,
  #[serde(default)]
  pub parameters: Option<ParamMap>,
  #[serde(default)]
  pub metrics: Option<ParamMap>,
}

/// A node row from `GET /api/workflows`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireNode {
  pub id: String,
  #[serde(rename = "type", default)]
  pub render_type: Option<String>,
  #[serde(default)]
  pub position: Option<WirePosition>,
  pub data: WireNodeData,
}

impl From<WireNode> for PipelineNode {
  fn from(w: WireNode) -> Self {
    let mut data = NodeData::for_kind(w.data.kind);
    if !w.data.label.is_empty() {
      data.label = w.data.label;
    }
    data.status = w.data.status.unwrap_or_default();
    data.progress = w.data.progress.unwrap_or(0).clamp(0, MAX_PROGRESS as i64) as u8;
    if let Some(p) = w.data.parameters {
      data.parameters = p;
    }
    if let Some(m) = w.data.metrics {
      data.metrics = m;
    }
    let position = w.position.unwrap_or_default();
    PipelineNode {
      id: w.id,
      render_type: w
        .render_type
        .unwrap_or_else(|| NODE_RENDER_TYPE.to_string()),
      position: Position::new(position.x, position.y),
      data,
    }
  }
}

/// An edge row from `GET /api/workflows/connections`.
#[derive(Debug, Clone, Deserialize)]
pub struct WireEdge {
  pub id: String,
  pub source: String,
  pub target: String,
  #[serde(rename = "type", default)]
  pub edge_type: Option<String>,
  #[serde(default)]
  pub animated: Option<bool>,
  #[serde(default)]
  pub style: Option<EdgeStyle>,
}

impl From<WireEdge> for PipelineEdge {
  fn from(w: WireEdge) -> Self {
    PipelineEdge {
      id: w.id,
      source: w.source,
      target: w.target,
      edge_type: w.edge_type.unwrap_or_else(|| DEFAULT_EDGE_TYPE.to_string()),
      animated: w.animated.unwrap_or(true),
      style: w.style.unwrap_or_default(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntPosition {
  pub x: i64,
  pub y: i64,
}

impl From<Position> for IntPosition {
  fn from(p: Position) -> Self {
    Self {
      x: p.x.round() as i64,
      y: p.y.round() as i64,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddNodeData<'a> {
  pub label: &'a str,
  #[serde(rename = "type")]
  pub kind: &'a NodeKind,
  pub status: NodeStatus,
  pub progress: u8,
  pub parameters: &'a ParamMap,
  pub metrics: &'a ParamMap,
}

/// Body of `POST /api/workflows/add_node`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddNodeRequest<'a> {
  #[serde(rename = "type")]
  pub render_type: &'a str,
  pub position: IntPosition,
  pub data: AddNodeData<'a>,
}

impl<'a> From<&'a PipelineNode> for AddNodeRequest<'a> {
  fn from(n: &'a PipelineNode) -> Self {
    Self {
      render_type: &n.render_type,
      position: n.position.into(),
      data: AddNodeData {
        label: &n.data.label,
        kind: &n.data.kind,
        status: n.data.status,
        progress: n.data.progress,
        parameters: &n.data.parameters,
        metrics: &n.data.metrics,
      },
    }
  }
}

/// Body of `POST /api/workflows/add_edge`. Endpoints are backend node ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddEdgeRequest<'a> {
  pub source: i64,
  pub target: i64,
  pub edge_type: &'a str,
  pub animated: bool,
  pub style: &'a EdgeStyle,
}

/// Reply to an add_node / add_edge call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Created {
  #[serde(default)]
  pub message: String,
  pub id: i64,
}

/// Body of `PUT /api/workflows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplaceGraphRequest<'a> {
  pub nodes: &'a [PipelineNode],
  pub edges: &'a [PipelineEdge],
}

impl<'a> From<&'a PipelineGraph> for ReplaceGraphRequest<'a> {
  fn from(g: &'a PipelineGraph) -> Self {
    Self {
      nodes: g.nodes(),
      edges: g.edges(),
    }
  }
}
