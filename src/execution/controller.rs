//! Pipeline controller: owns the graph and the execution context and
//! orchestrates run, pause, resume and stop over the node state machine.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use super::context::{ExecutionContext, ScheduledStart};
use super::node_machine::{NodeMachine, StartOutcome, TickOutcome, to_chrono};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::{PipelineError, SnapshotError};
use crate::persistence::WorkflowStore;
use crate::resolver;
use crate::types::{
  Checkpoint, CheckpointHistory, LogLevel, NODE_RENDER_TYPE, NodeKind, NodeStatus, Notice, ParamMap,
  PipelineEdge, PipelineGraph, PipelineNode, PipelineSnapshot, PipelineStatus, PipelineVersion,
  Position, RunLog,
};

/// A pipeline being edited and simulated.
#[derive(Debug)]
pub struct Pipeline {
  graph: PipelineGraph,
  version: PipelineVersion,
  status: PipelineStatus,
  ctx: ExecutionContext,
  config: EngineConfig,
  clock: Arc<dyn Clock>,
  log: RunLog,
  notices: Vec<Notice>,
  checkpoints: CheckpointHistory,
}

impl Pipeline {
  /// Idle pipeline over `graph` with default timing and the system clock.
  pub fn new(graph: PipelineGraph) -> Self {
    Self {
      graph,
      version: PipelineVersion::default(),
      status: PipelineStatus::Idle,
      ctx: ExecutionContext::default(),
      config: EngineConfig::default(),
      clock: Arc::new(SystemClock),
      log: RunLog::new(),
      notices: Vec::new(),
      checkpoints: CheckpointHistory::new(),
    }
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  pub fn with_version(mut self, version: PipelineVersion) -> Self {
    self.version = version;
    self
  }

  pub fn with_checkpoints(mut self, checkpoints: CheckpointHistory) -> Self {
    self.checkpoints = checkpoints;
    self
  }

  pub fn graph(&self) -> &PipelineGraph {
    &self.graph
  }

  pub fn node(&self, id: &str) -> Option<&PipelineNode> {
    self.graph.node(id)
  }

  pub fn status(&self) -> PipelineStatus {
    self.status
  }

  pub fn version(&self) -> PipelineVersion {
    self.version
  }

  pub fn context(&self) -> &ExecutionContext {
    &self.ctx
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn logs(&self) -> &RunLog {
    &self.log
  }

  pub fn checkpoints(&self) -> &CheckpointHistory {
    &self.checkpoints
  }

  pub fn notices(&self) -> &[Notice] {
    &self.notices
  }

  /// Drains queued notices, oldest first.
  pub fn take_notices(&mut self) -> Vec<Notice> {
    std::mem::take(&mut self.notices)
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  /// Earliest pending timer or scheduled start.
  pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
    self.ctx.next_deadline()
  }

  /// True when nothing is left to fire.
  pub fn is_settled(&self) -> bool {
    self.ctx.is_idle()
  }

  fn machine(&mut self, now: DateTime<Utc>) -> NodeMachine<'_> {
    NodeMachine {
      graph: &mut self.graph,
      ctx: &mut self.ctx,
      log: &mut self.log,
      config: &self.config,
      now,
    }
  }

  fn record(&mut self, level: LogLevel, message: impl Into<String>) {
    let now = self.clock.now();
    self.log.push(now, level, message, None);
  }

  /// Queues a warning notice for a refused user action and hands back `err`.
  fn refuse<T>(&mut self, title: &str, err: PipelineError) -> Result<T, PipelineError> {
    warn!(error = %err, "{}", title);
    self.notices.push(Notice::warning(title, err.to_string()));
    Err(err)
  }

  fn ensure_not_active(&mut self, title: &str) -> Result<(), PipelineError> {
    if self.status.is_active() {
      return self.refuse(title, PipelineError::RunInProgress);
    }
    Ok(())
  }

  /// Adds a catalogue node of `kind`; returns its id.
  pub fn add_node(&mut self, kind: NodeKind, position: Position) -> String {
    let id = self.graph.add_node(kind, position);
    self.record(LogLevel::Info, format!("node {} added", id));
    id
  }

  pub fn connect(&mut self, source: &str, target: &str) -> Result<PipelineEdge, PipelineError> {
    match self.graph.connect(source, target) {
      Ok(edge) => {
        let edge = edge.clone();
        self.record(LogLevel::Info, format!("connected {} -> {}", source, target));
        Ok(edge)
      }
      Err(e) => self.refuse("Connection refused", e),
    }
  }

  pub fn disconnect(&mut self, edge_id: &str) -> Result<PipelineEdge, PipelineError> {
    let edge = self.graph.disconnect(edge_id)?;
    self.record(LogLevel::Info, format!("edge {} removed", edge_id));
    Ok(edge)
  }

  pub fn set_parameters(&mut self, id: &str, parameters: ParamMap) -> Result<(), PipelineError> {
    self.graph.set_parameters(id, parameters)
  }

  pub fn set_output(&mut self, id: &str, output: Value) -> Result<(), PipelineError> {
    self.graph.set_output(id, output)
  }

  pub fn set_position(&mut self, id: &str, position: Position) -> Result<(), PipelineError> {
    self.graph.set_position(id, position)
  }

  /// Deletes a node and its edges. Running nodes are refused with the graph
  /// unchanged. Deleting the chain node of a paused run ends that run.
  #[instrument(level = "trace", skip(self))]
  pub fn delete_node(&mut self, id: &str) -> Result<PipelineNode, PipelineError> {
    let removed = match self.graph.remove_node(id) {
      Ok(n) => n,
      Err(e @ PipelineError::NodeRunning(_)) => {
        error!(node_id = id, "refusing to delete a running node");
        self.notices.push(Notice::error("Cannot delete node", e.to_string()));
        return Err(e);
      }
      Err(e) => return Err(e),
    };
    let was_chain = self.status.is_active() && self.ctx.is_chain_node(id);
    self.ctx.forget(id);
    if was_chain {
      self.ctx = ExecutionContext::default();
      self.status = PipelineStatus::Idle;
      self.record(
        LogLevel::Warning,
        format!("node {} was the current pipeline step; run ended", id),
      );
    }
    self.record(LogLevel::Info, format!("node {} deleted", id));
    self
      .notices
      .push(Notice::success("Node deleted", format!("node {} was deleted", id)));
    Ok(removed)
  }

  /// Checks a run may begin and resolves its order.
  fn prepare_run(&mut self) -> Result<Vec<String>, PipelineError> {
    if self.status == PipelineStatus::Running {
      return self.refuse("Cannot run", PipelineError::AlreadyRunning);
    }
    if self.graph.is_empty() {
      return self.refuse("Cannot run", PipelineError::EmptyPipeline);
    }
    match resolver::checked_execution_order(&self.graph) {
      Ok(order) if order.is_empty() => self.refuse("Cannot run", PipelineError::EmptyPipeline),
      Ok(order) => Ok(order),
      Err(e) => self.refuse("Cannot run", e),
    }
  }

  /// Resets every node and starts the first node of `order`.
  fn begin(&mut self, order: Vec<String>) {
    let now = self.clock.now();
    self.machine(now).reset_all();
    let first = order.first().cloned();
    info!(nodes = order.len(), "pipeline run started");
    self.ctx = ExecutionContext::for_order(order);
    self.status = PipelineStatus::Running;
    self.record(LogLevel::Info, "pipeline run started");
    if let Some(first) = first {
      self.start_chain_node(&first, now);
    }
  }

  /// Starts a local simulation without touching any store.
  pub fn start_simulation(&mut self) -> Result<(), PipelineError> {
    let order = self.prepare_run()?;
    self.begin(order);
    Ok(())
  }

  /// Saves the graph, notifies the backend, then starts the simulation. A
  /// failed save or notification aborts before any node starts.
  #[instrument(level = "trace", skip(self, store))]
  pub async fn run(&mut self, store: &dyn WorkflowStore) -> Result<(), PipelineError> {
    let order = self.prepare_run()?;
    self.persist(store).await?;
    match store.notify_run_started().await {
      Ok(ack) if ack.is_rejected() => {
        warn!(message = %ack.message, "backend rejected run start");
        self.record(
          LogLevel::Warning,
          format!("backend did not start a flow: {}", ack.message),
        );
        self
          .notices
          .push(Notice::warning("Backend run not started", ack.message));
      }
      Ok(_) => {}
      Err(e) => {
        error!(error = %e, "run start notification failed");
        self.record(LogLevel::Error, format!("pipeline start failed: {}", e));
        self
          .notices
          .push(Notice::error("Pipeline run failed", e.to_string()));
        return Err(e.into());
      }
    }
    self.begin(order);
    Ok(())
  }

  fn start_chain_node(&mut self, node_id: &str, at: DateTime<Utc>) {
    match self.machine(at).start(node_id) {
      Ok(StartOutcome::Started) => {}
      Ok(other) => {
        warn!(node_id, outcome = ?other, "chain node did not start");
      }
      Err(e) => {
        self.status = PipelineStatus::Error;
        self.ctx.scheduled = None;
        self.log.push(
          at,
          LogLevel::Error,
          format!("pipeline halted at node {}: {}", node_id, e),
          Some(node_id),
        );
        self.notices.push(Notice::error(
          "Pipeline run failed",
          format!("node {}: {}", node_id, e),
        ));
      }
    }
  }

  /// Pauses every running node and any pending chain start.
  pub fn pause(&mut self) -> Result<(), PipelineError> {
    if self.status != PipelineStatus::Running {
      return self.refuse("Cannot pause", PipelineError::NotRunning);
    }
    let now = self.clock.now();
    let running = self.graph.ids_with_status(NodeStatus::Running);
    let mut machine = self.machine(now);
    for id in &running {
      machine.pause(id);
    }
    if let Some(s) = self.ctx.scheduled.take() {
      self.ctx.deferred = Some(s.node_id);
    }
    self.ctx.timers.release_all();
    self.status = PipelineStatus::Paused;
    info!(paused = running.len(), "pipeline paused");
    self.record(LogLevel::Info, "pipeline paused");
    self
      .notices
      .push(Notice::info("Pipeline paused", "pipeline execution was paused"));
    Ok(())
  }

  /// Resumes the first paused node from its stored progress, or the chain
  /// start that pause interrupted.
  pub fn resume(&mut self) -> Result<(), PipelineError> {
    if self.status != PipelineStatus::Paused {
      return self.refuse("Cannot resume", PipelineError::NothingToResume);
    }
    let now = self.clock.now();
    let first_paused = self
      .graph
      .ids_with_status(NodeStatus::Paused)
      .into_iter()
      .next();
    if let Some(id) = first_paused {
      self.machine(now).resume(&id);
    } else if let Some(id) = self.ctx.deferred.take() {
      self.status = PipelineStatus::Running;
      self.start_chain_node(&id, now);
    } else {
      return self.refuse("Cannot resume", PipelineError::NothingToResume);
    }
    if self.status == PipelineStatus::Paused {
      self.status = PipelineStatus::Running;
    }
    info!("pipeline resumed");
    self.record(LogLevel::Info, "pipeline resumed");
    self
      .notices
      .push(Notice::info("Pipeline resumed", "pipeline execution resumed"));
    Ok(())
  }

  /// Cancels every timer, returns all nodes to {idle, 0} and drops the run.
  /// Calling it again changes nothing.
  pub fn stop(&mut self) {
    let now = self.clock.now();
    self.machine(now).reset_all();
    self.ctx = ExecutionContext::default();
    self.status = PipelineStatus::Idle;
    info!("pipeline stopped");
    self.record(LogLevel::Info, "pipeline stopped");
    self
      .notices
      .push(Notice::info("Pipeline stopped", "pipeline execution was stopped"));
  }

  /// Manually starts a single node. Refused while a pipeline run is active.
  pub fn run_node(&mut self, node_id: &str) -> Result<StartOutcome, PipelineError> {
    self.ensure_not_active("Cannot run node")?;
    let now = self.clock.now();
    match self.machine(now).start(node_id) {
      Ok(outcome) => Ok(outcome),
      Err(e @ PipelineError::DependencyFailed { .. }) => {
        self.status = PipelineStatus::Error;
        self
          .notices
          .push(Notice::error("Node run failed", e.to_string()));
        Err(e)
      }
      Err(e) => Err(e),
    }
  }

  /// Manually stops a single node. Stopping the current chain node ends the run.
  pub fn stop_node(&mut self, node_id: &str) -> Result<(), PipelineError> {
    let was_chain = self.status.is_active() && self.ctx.is_chain_node(node_id);
    let now = self.clock.now();
    self.machine(now).stop(node_id)?;
    if was_chain {
      self.ctx = ExecutionContext::default();
      self.status = PipelineStatus::Idle;
    }
    self.notices.push(Notice::warning(
      "Node stopped",
      format!("node {} was stopped", node_id),
    ));
    Ok(())
  }

  /// Fires every timer and scheduled start due at the clock's current time,
  /// in deadline order. Returns how many events fired.
  pub fn poll(&mut self) -> usize {
    let mut fired = 0;
    loop {
      let now = self.clock.now();
      let timer = self
        .ctx
        .timers
        .earliest()
        .filter(|(_, at)| *at <= now)
        .map(|(id, at)| (id.to_string(), at));
      let start = self.ctx.scheduled.clone().filter(|s| s.at <= now);
      match (timer, start) {
        (Some((id, at)), Some(s)) if at <= s.at => self.fire_tick(&id, at),
        (_, Some(s)) => self.fire_start(s),
        (Some((id, at)), None) => self.fire_tick(&id, at),
        (None, None) => break,
      }
      fired += 1;
    }
    fired
  }

  fn fire_start(&mut self, s: ScheduledStart) {
    self.ctx.scheduled = None;
    self.start_chain_node(&s.node_id, s.at);
  }

  fn fire_tick(&mut self, node_id: &str, at: DateTime<Utc>) {
    let on_chain = self.status == PipelineStatus::Running && self.ctx.is_chain_node(node_id);
    match self.machine(at).tick(node_id) {
      TickOutcome::Completed if on_chain => self.advance_chain(at),
      TickOutcome::Failed(reason) => {
        self.status = PipelineStatus::Error;
        if on_chain {
          self.ctx.scheduled = None;
        }
        let message = self
          .graph
          .node(node_id)
          .and_then(|n| n.data.error.clone())
          .unwrap_or_else(|| format!("{:?}", reason));
        self.notices.push(Notice::error(
          "Pipeline run failed",
          format!("node {}: {}", node_id, message),
        ));
      }
      _ => {}
    }
  }

  fn advance_chain(&mut self, at: DateTime<Utc>) {
    let delay = to_chrono(self.config.advance_delay());
    if let Some(next) = self.ctx.advance().map(str::to_string) {
      let start_at = at.checked_add_signed(delay).unwrap_or(at);
      self.ctx.scheduled = Some(ScheduledStart {
        node_id: next,
        at: start_at,
      });
      return;
    }
    self.status = PipelineStatus::Completed;
    self.ctx = ExecutionContext::default();
    info!("pipeline completed");
    self.log.push(at, LogLevel::Info, "pipeline run completed", None);
    self.notices.push(Notice::success(
      "Pipeline completed",
      "all nodes ran successfully",
    ));
  }

  async fn persist(&mut self, store: &dyn WorkflowStore) -> Result<(), PipelineError> {
    if let Err(e) = store.replace_graph(&self.graph).await {
      error!(error = %e, "pipeline save failed");
      self.record(LogLevel::Error, format!("pipeline save failed: {}", e));
      self
        .notices
        .push(Notice::error("Pipeline save failed", e.to_string()));
      return Err(e.into());
    }
    Ok(())
  }

  /// Saves the graph and bumps the patch version.
  pub async fn save(&mut self, store: &dyn WorkflowStore) -> Result<PipelineVersion, PipelineError> {
    self.persist(store).await?;
    self.version = self.version.bump_patch();
    info!(version = %self.version, "pipeline saved");
    self.record(
      LogLevel::Info,
      format!("pipeline saved as version {}", self.version),
    );
    self.notices.push(Notice::success(
      "Pipeline saved",
      format!("saved as version {}", self.version),
    ));
    Ok(self.version)
  }

  /// Replaces the graph with the stored one. On failure the graph is unchanged.
  pub async fn load(&mut self, store: &dyn WorkflowStore) -> Result<(), PipelineError> {
    self.ensure_not_active("Cannot load")?;
    let loaded = async {
      let nodes = store.load_nodes().await?;
      let edges = store.load_edges().await?;
      Ok::<_, PipelineError>(PipelineGraph::from_parts(nodes, edges)?)
    }
    .await;
    match loaded {
      Ok(graph) => {
        self.replace_graph(graph);
        self.record(
          LogLevel::Info,
          format!("pipeline loaded ({} nodes)", self.graph.len()),
        );
        Ok(())
      }
      Err(e) => {
        error!(error = %e, "pipeline load failed");
        self
          .notices
          .push(Notice::error("Pipeline load failed", e.to_string()));
        Err(e)
      }
    }
  }

  fn replace_graph(&mut self, graph: PipelineGraph) {
    self.ctx = ExecutionContext::default();
    self.graph = graph;
    self.status = PipelineStatus::Idle;
  }

  /// Current graph and version, stamped with the clock's time.
  pub fn export(&mut self) -> PipelineSnapshot {
    let snapshot = PipelineSnapshot::capture(&self.graph, self.version, self.clock.now());
    self.record(
      LogLevel::Info,
      format!("pipeline exported as {}", snapshot.file_name()),
    );
    snapshot
  }

  /// Replaces the graph and version with an exported snapshot.
  pub fn import(&mut self, snapshot: PipelineSnapshot) -> Result<(), PipelineError> {
    self.ensure_not_active("Cannot import")?;
    let nodes = snapshot
      .nodes
      .into_iter()
      .map(|mut n| {
        n.render_type = NODE_RENDER_TYPE.to_string();
        n
      })
      .collect();
    let graph = PipelineGraph::from_parts(nodes, snapshot.edges)?;
    self.replace_graph(graph);
    self.version = snapshot.version;
    self.record(
      LogLevel::Info,
      format!("pipeline imported (version {})", self.version),
    );
    self.notices.push(Notice::success(
      "Pipeline imported",
      "pipeline restored from file",
    ));
    Ok(())
  }

  /// Saves the current graph as a checkpoint and returns a copy of it.
  pub fn checkpoint(&mut self) -> Checkpoint {
    let cp = Checkpoint::capture(&self.graph, self.version, self.clock.now());
    self.record(
      LogLevel::Info,
      format!("checkpoint created (version {})", self.version),
    );
    self.notices.push(Notice::success(
      "Checkpoint created",
      format!("current state saved (version {})", self.version),
    ));
    self.checkpoints.push(cp.clone());
    cp
  }

  /// Restores the graph and version from checkpoint `id`.
  pub fn restore_checkpoint(&mut self, id: &str) -> Result<(), PipelineError> {
    self.ensure_not_active("Cannot restore checkpoint")?;
    let cp = self
      .checkpoints
      .get(id)
      .cloned()
      .ok_or_else(|| SnapshotError::CheckpointNotFound(id.to_string()))?;
    let graph = PipelineGraph::from_parts(cp.nodes, cp.edges)?;
    self.replace_graph(graph);
    self.version = cp.version;
    self.record(
      LogLevel::Info,
      format!("checkpoint {} restored (version {})", id, self.version),
    );
    Ok(())
  }

  /// Checkpoints the current graph, then clears it and resets the version.
  pub fn delete_pipeline(&mut self) {
    self.checkpoint();
    let now = self.clock.now();
    self.machine(now).reset_all();
    self.graph.clear();
    self.ctx = ExecutionContext::default();
    self.status = PipelineStatus::Idle;
    self.version = PipelineVersion::INITIAL;
    info!("pipeline deleted");
    self.record(LogLevel::Info, "pipeline deleted");
    self
      .notices
      .push(Notice::info("Pipeline deleted", "pipeline was deleted"));
  }
}
