//! The pipeline graph model: nodes in canvas order plus directed edges.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{instrument, warn};

use super::{MAX_PROGRESS, NodeKind, NodeStatus, ParamMap, PipelineEdge, PipelineNode, Position};
use crate::error::PipelineError;

/// The pipeline graph model.
///
/// Node order is the canvas insertion order and is significant: the execution
/// order resolver visits nodes in this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineGraph {
  nodes: Vec<PipelineNode>,
  edges: Vec<PipelineEdge>,
}

impl PipelineGraph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Builds a graph from loaded parts. Duplicate node ids are rejected; edges
  /// whose endpoints do not exist are dropped. Progress above 100 is clamped.
  pub fn from_parts(
    mut nodes: Vec<PipelineNode>,
    edges: Vec<PipelineEdge>,
  ) -> Result<Self, PipelineError> {
    for n in nodes.iter_mut().filter(|n| n.data.progress > MAX_PROGRESS) {
      warn!(node_id = %n.id, progress = n.data.progress, "clamping out-of-range progress");
      n.data.progress = MAX_PROGRESS;
    }
    let mut seen = HashSet::new();
    for n in &nodes {
      if !seen.insert(n.id.as_str()) {
        return Err(PipelineError::DuplicateNode(n.id.clone()));
      }
    }
    let edges = edges
      .into_iter()
      .filter(|e| {
        let keep = seen.contains(e.source.as_str()) && seen.contains(e.target.as_str());
        if !keep {
          warn!(edge_id = %e.id, source = %e.source, target = %e.target, "dropping dangling edge");
        }
        keep
      })
      .collect();
    Ok(Self { nodes, edges })
  }

  /// The ten-step MLOps pipeline: every palette kind, chained left to right.
  pub fn mlops_template() -> Self {
    let nodes: Vec<PipelineNode> = NodeKind::PALETTE
      .iter()
      .enumerate()
      .map(|(i, kind)| {
        PipelineNode::new(
          (i + 1).to_string(),
          kind.clone(),
          Position::new(100.0 + 400.0 * i as f64, 100.0),
        )
      })
      .collect();
    let edges = nodes
      .windows(2)
      .map(|pair| PipelineEdge::between(pair[0].id.clone(), pair[1].id.clone()))
      .collect();
    Self { nodes, edges }
  }

  pub fn nodes(&self) -> &[PipelineNode] {
    &self.nodes
  }

  pub fn edges(&self) -> &[PipelineEdge] {
    &self.edges
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.nodes.iter().any(|n| n.id == id)
  }

  pub fn node(&self, id: &str) -> Option<&PipelineNode> {
    self.nodes.iter().find(|n| n.id == id)
  }

  pub fn node_mut(&mut self, id: &str) -> Option<&mut PipelineNode> {
    self.nodes.iter_mut().find(|n| n.id == id)
  }

  /// Ids of nodes currently in `status`, in canvas order.
  pub fn ids_with_status(&self, status: NodeStatus) -> Vec<String> {
    self
      .nodes
      .iter()
      .filter(|n| n.status() == status)
      .map(|n| n.id.clone())
      .collect()
  }

  /// Edges pointing into `id`.
  pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a PipelineEdge> + 'a {
    self.edges.iter().filter(move |e| e.target == id)
  }

  /// Edges leaving `id`.
  pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a PipelineEdge> + 'a {
    self.edges.iter().filter(move |e| e.source == id)
  }

  /// Direct predecessors of `id` that exist in the graph.
  pub fn predecessors(&self, id: &str) -> Vec<&PipelineNode> {
    self
      .incoming_edges(id)
      .filter_map(|e| self.node(&e.source))
      .collect()
  }

  /// First direct predecessor of `id` whose status is failed.
  pub fn failed_predecessor(&self, id: &str) -> Option<&PipelineNode> {
    self
      .predecessors(id)
      .into_iter()
      .find(|n| n.status() == NodeStatus::Failed)
  }

  /// True if `to` is reachable from `from` by following edges forward.
  pub fn reaches(&self, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
      if id == to {
        return true;
      }
      if !seen.insert(id) {
        continue;
      }
      stack.extend(self.outgoing_edges(id).map(|e| e.target.as_str()));
    }
    false
  }

  /// Smallest numeric id greater than every numeric id in use.
  pub fn next_node_id(&self) -> String {
    let mut next = self
      .nodes
      .iter()
      .filter_map(|n| n.id.parse::<u64>().ok())
      .max()
      .map(|m| m + 1)
      .unwrap_or(self.nodes.len() as u64 + 1);
    while self.contains(&next.to_string()) {
      next += 1;
    }
    next.to_string()
  }

  /// Adds a new catalogue node of `kind` at `position`; returns its id.
  #[instrument(level = "trace", skip(self))]
  pub fn add_node(&mut self, kind: NodeKind, position: Position) -> String {
    let id = self.next_node_id();
    self.nodes.push(PipelineNode::new(id.clone(), kind, position));
    id
  }

  /// Inserts a fully built node; rejects duplicate ids.
  pub fn insert_node(&mut self, node: PipelineNode) -> Result<(), PipelineError> {
    if self.contains(&node.id) {
      return Err(PipelineError::DuplicateNode(node.id));
    }
    self.nodes.push(node);
    Ok(())
  }

  /// Removes a node and every edge touching it. A running node is refused and
  /// the graph is left untouched.
  #[instrument(level = "trace", skip(self))]
  pub fn remove_node(&mut self, id: &str) -> Result<PipelineNode, PipelineError> {
    let idx = self
      .nodes
      .iter()
      .position(|n| n.id == id)
      .ok_or_else(|| PipelineError::NodeNotFound(id.to_string()))?;
    if self.nodes[idx].is_running() {
      return Err(PipelineError::NodeRunning(id.to_string()));
    }
    self.edges.retain(|e| !e.touches(id));
    Ok(self.nodes.remove(idx))
  }

  /// Connects `source -> target`. Missing endpoints, self-loops, duplicates
  /// and edges that would close a cycle are refused.
  #[instrument(level = "trace", skip(self))]
  pub fn connect(&mut self, source: &str, target: &str) -> Result<&PipelineEdge, PipelineError> {
    for id in [source, target] {
      if !self.contains(id) {
        return Err(PipelineError::NodeNotFound(id.to_string()));
      }
    }
    if source == target {
      return Err(PipelineError::SelfLoop(source.to_string()));
    }
    if self
      .edges
      .iter()
      .any(|e| e.source == source && e.target == target)
    {
      return Err(PipelineError::DuplicateEdge {
        from: source.to_string(),
        to: target.to_string(),
      });
    }
    if self.reaches(target, source) {
      return Err(PipelineError::WouldCycle {
        from: source.to_string(),
        to: target.to_string(),
      });
    }
    let mut edge = PipelineEdge::between(source, target);
    edge.id = self.unique_edge_id(&edge.id);
    self.edges.push(edge);
    Ok(&self.edges[self.edges.len() - 1])
  }

  /// `base`, or `base-2`, `base-3`, ... when an edge already uses it. Ids from
  /// `e{source}-{target}` collide when node ids contain `-`.
  fn unique_edge_id(&self, base: &str) -> String {
    let taken = |id: &str| self.edges.iter().any(|e| e.id == id);
    let mut id = base.to_string();
    let mut n = 2;
    while taken(&id) {
      id = format!("{}-{}", base, n);
      n += 1;
    }
    id
  }

  /// Removes the edge with `edge_id`.
  pub fn disconnect(&mut self, edge_id: &str) -> Result<PipelineEdge, PipelineError> {
    let idx = self
      .edges
      .iter()
      .position(|e| e.id == edge_id)
      .ok_or_else(|| PipelineError::EdgeNotFound(edge_id.to_string()))?;
    Ok(self.edges.remove(idx))
  }

  /// Replaces a node's parameter map.
  pub fn set_parameters(&mut self, id: &str, parameters: ParamMap) -> Result<(), PipelineError> {
    let node = self
      .node_mut(id)
      .ok_or_else(|| PipelineError::NodeNotFound(id.to_string()))?;
    node.data.parameters = parameters;
    Ok(())
  }

  /// Sets the output a node hands to validation.
  pub fn set_output(&mut self, id: &str, output: Value) -> Result<(), PipelineError> {
    let node = self
      .node_mut(id)
      .ok_or_else(|| PipelineError::NodeNotFound(id.to_string()))?;
    node.data.output = Some(output);
    Ok(())
  }

  /// Moves a node on the canvas.
  pub fn set_position(&mut self, id: &str, position: Position) -> Result<(), PipelineError> {
    let node = self
      .node_mut(id)
      .ok_or_else(|| PipelineError::NodeNotFound(id.to_string()))?;
    node.position = position;
    Ok(())
  }

  /// Resets every node to {idle, 0}.
  pub fn reset_all(&mut self) {
    for n in &mut self.nodes {
      n.reset();
    }
  }

  /// Removes all nodes and edges.
  pub fn clear(&mut self) {
    self.nodes.clear();
    self.edges.clear();
  }

  pub fn into_parts(self) -> (Vec<PipelineNode>, Vec<PipelineEdge>) {
    (self.nodes, self.edges)
  }
}
