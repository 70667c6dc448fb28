//! Ephemeral execution context: the run order, the chain cursor, the node id
//! sets and the timer registry through which every progress timer is owned.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

/// Progress timers keyed by node id. A node has at most one armed timer;
/// a node that leaves `running` must have its timer released here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimerRegistry {
  timers: BTreeMap<String, DateTime<Utc>>,
}

impl TimerRegistry {
  /// Arms (or re-arms) the timer for `node_id`.
  pub fn arm(&mut self, node_id: &str, deadline: DateTime<Utc>) {
    self.timers.insert(node_id.to_string(), deadline);
  }

  /// Releases the timer for `node_id`; true if one was armed.
  pub fn release(&mut self, node_id: &str) -> bool {
    self.timers.remove(node_id).is_some()
  }

  /// Releases every timer; returns how many were armed.
  pub fn release_all(&mut self) -> usize {
    let n = self.timers.len();
    self.timers.clear();
    n
  }

  pub fn deadline(&self, node_id: &str) -> Option<DateTime<Utc>> {
    self.timers.get(node_id).copied()
  }

  pub fn contains(&self, node_id: &str) -> bool {
    self.timers.contains_key(node_id)
  }

  /// Earliest armed timer; ties resolve by node id.
  pub fn earliest(&self) -> Option<(&str, DateTime<Utc>)> {
    self
      .timers
      .iter()
      .min_by_key(|(_, at)| **at)
      .map(|(id, at)| (id.as_str(), *at))
  }

  pub fn len(&self) -> usize {
    self.timers.len()
  }

  pub fn is_empty(&self) -> bool {
    self.timers.is_empty()
  }
}

/// A chain node waiting for the advance delay to elapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledStart {
  pub node_id: String,
  pub at: DateTime<Utc>,
}

/// Per-run execution state, created fresh by every pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionContext {
  /// Node ids in resolver order for the current run.
  pub execution_order: Vec<String>,
  /// Index of the chain node within `execution_order`.
  pub current_index: usize,
  pub running: HashSet<String>,
  pub paused: HashSet<String>,
  pub timers: TimerRegistry,
  /// Next chain node, started once its delay elapses.
  pub scheduled: Option<ScheduledStart>,
  /// A scheduled start cancelled by pause, picked up again by resume.
  pub deferred: Option<String>,
}

impl ExecutionContext {
  /// Context for a new run over `order`.
  pub fn for_order(order: Vec<String>) -> Self {
    Self {
      execution_order: order,
      ..Self::default()
    }
  }

  /// The node the automatic chain is currently on, if a run is in progress.
  pub fn chain_node(&self) -> Option<&str> {
    self
      .execution_order
      .get(self.current_index)
      .map(String::as_str)
  }

  pub fn is_chain_node(&self, node_id: &str) -> bool {
    self.chain_node() == Some(node_id)
  }

  /// Moves the cursor forward; returns the new chain node, or `None` when the
  /// order is exhausted.
  pub fn advance(&mut self) -> Option<&str> {
    if self.current_index + 1 >= self.execution_order.len() {
      return None;
    }
    self.current_index += 1;
    self.chain_node()
  }

  /// Earliest pending event: a progress timer or the scheduled chain start.
  pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
    let timer = self.timers.earliest().map(|(_, at)| at);
    let start = self.scheduled.as_ref().map(|s| s.at);
    match (timer, start) {
      (Some(a), Some(b)) => Some(a.min(b)),
      (a, b) => a.or(b),
    }
  }

  /// True when no timer and no scheduled start remain.
  pub fn is_idle(&self) -> bool {
    self.timers.is_empty() && self.scheduled.is_none()
  }

  /// Forgets the node: releases its timer and drops it from the id sets and
  /// from any pending start.
  pub fn forget(&mut self, node_id: &str) {
    self.timers.release(node_id);
    self.running.remove(node_id);
    self.paused.remove(node_id);
    if self.scheduled.as_ref().is_some_and(|s| s.node_id == node_id) {
      self.scheduled = None;
    }
    if self.deferred.as_deref() == Some(node_id) {
      self.deferred = None;
    }
  }
}
