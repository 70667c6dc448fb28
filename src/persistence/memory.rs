//! In-process workflow store, used by the CLI's offline mode and by tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::store::{RemoteRunState, RunAck, RunStatus, WorkflowStore};
use crate::error::StoreError;
use crate::types::{PipelineEdge, PipelineGraph, PipelineNode};

#[derive(Debug, Default)]
struct State {
  graph: PipelineGraph,
  saves: usize,
  run_starts: usize,
  fail_saves: bool,
  fail_loads: bool,
  fail_run_start: bool,
}

/// Keeps the stored graph in memory. Failures can be injected per operation.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
  state: Mutex<State>,
}

impl InMemoryWorkflowStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_graph(graph: PipelineGraph) -> Self {
    let store = Self::default();
    store.lock().graph = graph;
    store
  }

  fn lock(&self) -> std::sync::MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Currently stored graph.
  pub fn graph(&self) -> PipelineGraph {
    self.lock().graph.clone()
  }

  pub fn save_count(&self) -> usize {
    self.lock().saves
  }

  pub fn run_start_count(&self) -> usize {
    self.lock().run_starts
  }

  pub fn fail_saves(&self, fail: bool) {
    self.lock().fail_saves = fail;
  }

  pub fn fail_loads(&self, fail: bool) {
    self.lock().fail_loads = fail;
  }

  pub fn fail_run_start(&self, fail: bool) {
    self.lock().fail_run_start = fail;
  }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
  async fn load_nodes(&self) -> Result<Vec<PipelineNode>, StoreError> {
    let state = self.lock();
    if state.fail_loads {
      return Err(StoreError::Unavailable("load_nodes".to_string()));
    }
    Ok(state.graph.nodes().to_vec())
  }

  async fn load_edges(&self) -> Result<Vec<PipelineEdge>, StoreError> {
    let state = self.lock();
    if state.fail_loads {
      return Err(StoreError::Unavailable("load_edges".to_string()));
    }
    Ok(state.graph.edges().to_vec())
  }

  async fn replace_graph(&self, graph: &PipelineGraph) -> Result<(), StoreError> {
    let mut state = self.lock();
    if state.fail_saves {
      return Err(StoreError::Unavailable("replace_graph".to_string()));
    }
    state.graph = graph.clone();
    state.saves += 1;
    Ok(())
  }

  async fn notify_run_started(&self) -> Result<RunAck, StoreError> {
    let mut state = self.lock();
    if state.fail_run_start {
      return Err(StoreError::Unavailable("notify_run_started".to_string()));
    }
    state.run_starts += 1;
    Ok(RunAck {
      status: "started".to_string(),
      message: "run accepted".to_string(),
    })
  }

  async fn run_status(&self) -> Result<RunStatus, StoreError> {
    Ok(RunStatus {
      status: RemoteRunState::Completed,
      message: "No flow is currently running.".to_string(),
    })
  }
}
