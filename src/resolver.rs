//! Execution order resolver: depth-first post-order over predecessors.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::error::PipelineError;
use crate::types::PipelineGraph;

/// Returns an order in which every edge's source precedes its target.
///
/// Nodes are visited in canvas order; each visit first visits the node's
/// direct predecessors (in edge order) and then appends the node. The visited
/// set keeps this total on cyclic graphs, where the result is unspecified for
/// the edges on the cycle.
#[instrument(level = "trace", skip(graph), fields(nodes = graph.len()))]
pub fn execution_order(graph: &PipelineGraph) -> Vec<String> {
  let mut preds: HashMap<&str, Vec<&str>> = HashMap::new();
  for e in graph.edges() {
    preds.entry(e.target.as_str()).or_default().push(e.source.as_str());
  }
  let mut visited: HashSet<&str> = HashSet::new();
  let mut order = Vec::with_capacity(graph.len());
  for root in graph.nodes() {
    if !visited.insert(root.id.as_str()) {
      continue;
    }
    // (node, index of next predecessor to visit)
    let mut stack: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
    while let Some((id, next)) = stack.last_mut() {
      let id = *id;
      let ps = preds.get(id).map(Vec::as_slice).unwrap_or(&[]);
      if let Some(&p) = ps.get(*next) {
        *next += 1;
        if visited.insert(p) {
          stack.push((p, 0));
        }
      } else {
        order.push(id.to_string());
        stack.pop();
      }
    }
  }
  order
}

/// Finds one directed cycle, returned as the node ids along it.
#[instrument(level = "trace", skip(graph))]
pub fn find_cycle(graph: &PipelineGraph) -> Option<Vec<String>> {
  #[derive(Clone, Copy, PartialEq)]
  enum Mark {
    OnPath,
    Done,
  }

  let mut succs: HashMap<&str, Vec<&str>> = HashMap::new();
  for e in graph.edges() {
    succs.entry(e.source.as_str()).or_default().push(e.target.as_str());
  }
  let mut marks: HashMap<&str, Mark> = HashMap::new();
  for root in graph.nodes() {
    if marks.contains_key(root.id.as_str()) {
      continue;
    }
    // (node, index of next successor to explore)
    let mut path: Vec<(&str, usize)> = vec![(root.id.as_str(), 0)];
    marks.insert(root.id.as_str(), Mark::OnPath);
    while let Some((id, next)) = path.last_mut() {
      let id = *id;
      let children = succs.get(id).map(Vec::as_slice).unwrap_or(&[]);
      if let Some(&child) = children.get(*next) {
        *next += 1;
        match marks.get(child) {
          Some(Mark::OnPath) => {
            let start = path.iter().position(|(n, _)| *n == child).unwrap_or(0);
            return Some(path[start..].iter().map(|(n, _)| n.to_string()).collect());
          }
          Some(Mark::Done) => {}
          None => {
            marks.insert(child, Mark::OnPath);
            path.push((child, 0));
          }
        }
      } else {
        marks.insert(id, Mark::Done);
        path.pop();
      }
    }
  }
  None
}

/// [execution_order] for a graph that must be acyclic.
pub fn checked_execution_order(graph: &PipelineGraph) -> Result<Vec<String>, PipelineError> {
  if let Some(cycle) = find_cycle(graph) {
    return Err(PipelineError::CyclicGraph(cycle));
  }
  Ok(execution_order(graph))
}
