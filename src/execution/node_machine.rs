//! Node execution state machine.
//!
//! Drives a single node through `idle -> running -> completed | failed |
//! stopped`, with `running <-> paused` on the side. Pipeline-level reactions
//! (pipeline status, chain advance, notices) belong to the controller; this
//! module only reports what happened to the node.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

use super::context::ExecutionContext;
use super::validation::validate_output;
use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::types::{LogLevel, NodeStatus, PipelineGraph, RunLog};

/// Result of a start request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
  Started,
  /// The node is paused; start requests leave it alone.
  SkippedPaused,
  /// The node already has a live progress timer.
  AlreadyRunning,
}

/// Why a running node failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
  Timeout,
  Validation(String),
}

/// What one progress tick did to the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
  Progressed(u8),
  Completed,
  Failed(FailureReason),
  /// The node was not running; its stale timer was released.
  Ignored,
}

/// Borrowed view over the parts of the pipeline the state machine mutates.
pub struct NodeMachine<'a> {
  pub graph: &'a mut PipelineGraph,
  pub ctx: &'a mut ExecutionContext,
  pub log: &'a mut RunLog,
  pub config: &'a EngineConfig,
  /// Time of the event being processed.
  pub now: DateTime<Utc>,
}

pub(crate) fn to_chrono(d: std::time::Duration) -> Duration {
  Duration::from_std(d).unwrap_or(Duration::MAX)
}

impl NodeMachine<'_> {
  fn tick_after(&self, from: DateTime<Utc>) -> DateTime<Utc> {
    from
      .checked_add_signed(to_chrono(self.config.tick_interval()))
      .unwrap_or(DateTime::<Utc>::MAX_UTC)
  }

  /// Enters `running`. A failed direct predecessor fails the node instead and
  /// is reported as [PipelineError::DependencyFailed]; the node never runs.
  #[instrument(level = "trace", skip(self))]
  pub fn start(&mut self, node_id: &str) -> Result<StartOutcome, PipelineError> {
    let now = self.now;
    if !self.graph.contains(node_id) {
      return Err(PipelineError::NodeNotFound(node_id.to_string()));
    }
    let failed_upstream = self
      .graph
      .failed_predecessor(node_id)
      .map(|n| n.id.clone());
    if let Some(upstream) = failed_upstream {
      let message = format!("upstream node {} failed", upstream);
      if let Some(n) = self.graph.node_mut(node_id) {
        n.data.status = NodeStatus::Failed;
        n.data.error = Some(message.clone());
      }
      self.ctx.forget(node_id);
      self.log.push(
        now,
        LogLevel::Error,
        format!("node {} could not start: {}", node_id, message),
        Some(node_id),
      );
      warn!(node_id, upstream = %upstream, "dependency failed");
      return Err(PipelineError::DependencyFailed {
        node: node_id.to_string(),
        upstream,
      });
    }
    let Some(node) = self.graph.node(node_id) else {
      return Err(PipelineError::NodeNotFound(node_id.to_string()));
    };
    match node.status() {
      NodeStatus::Paused => {
        debug!(node_id, "node is paused, start skipped");
        return Ok(StartOutcome::SkippedPaused);
      }
      NodeStatus::Running if self.ctx.timers.contains(node_id) => {
        return Ok(StartOutcome::AlreadyRunning);
      }
      _ => {}
    }
    let label = node.data.label.clone();
    if let Some(n) = self.graph.node_mut(node_id) {
      n.data.status = NodeStatus::Running;
      n.data.progress = 0;
      n.data.error = None;
      n.data.start_time = Some(now);
      n.data.completed_at = None;
      n.data.paused_at = None;
    }
    self.ctx.running.insert(node_id.to_string());
    self.ctx.paused.remove(node_id);
    let deadline = self.tick_after(now);
    self.ctx.timers.arm(node_id, deadline);
    self.log.push(
      now,
      LogLevel::Info,
      format!("node {} ({}) started", node_id, label),
      Some(node_id),
    );
    info!(node_id, label = %label, "node started");
    Ok(StartOutcome::Started)
  }

  /// One progress tick for `node_id`, fired at `self.now`.
  #[instrument(level = "trace", skip(self))]
  pub fn tick(&mut self, node_id: &str) -> TickOutcome {
    let now = self.now;
    let timeout = to_chrono(self.config.node_timeout());
    let step = self.config.progress_step();
    let Some(node) = self.graph.node(node_id).filter(|n| n.is_running()) else {
      self.ctx.timers.release(node_id);
      self.ctx.running.remove(node_id);
      return TickOutcome::Ignored;
    };
    let started = node.data.start_time.unwrap_or(now);
    if now - started > timeout {
      return self.fail_running(
        node_id,
        FailureReason::Timeout,
        format!(
          "execution timed out after {}s",
          self.config.node_timeout().as_secs()
        ),
      );
    }
    let progress = node.progress().saturating_add(step).min(100);
    if progress < 100 {
      if let Some(n) = self.graph.node_mut(node_id) {
        n.data.progress = progress;
      }
      let next = self.tick_after(self.ctx.timers.deadline(node_id).unwrap_or(now));
      self.ctx.timers.arm(node_id, next);
      return TickOutcome::Progressed(progress);
    }
    let validated = validate_output(node);
    match validated {
      Ok(()) => {
        self.ctx.timers.release(node_id);
        self.ctx.running.remove(node_id);
        if let Some(n) = self.graph.node_mut(node_id) {
          n.data.status = NodeStatus::Completed;
          n.data.progress = 100;
          n.data.completed_at = Some(now);
        }
        self.log.push(
          now,
          LogLevel::Info,
          format!("node {} completed", node_id),
          Some(node_id),
        );
        info!(node_id, "node completed");
        TickOutcome::Completed
      }
      Err(message) => {
        if let Some(n) = self.graph.node_mut(node_id) {
          n.data.progress = 100;
        }
        self.fail_running(
          node_id,
          FailureReason::Validation(message.clone()),
          format!("output validation failed: {}", message),
        )
      }
    }
  }

  fn fail_running(&mut self, node_id: &str, reason: FailureReason, message: String) -> TickOutcome {
    self.ctx.timers.release(node_id);
    self.ctx.running.remove(node_id);
    let stored = match &reason {
      FailureReason::Timeout => message.clone(),
      FailureReason::Validation(m) => m.clone(),
    };
    if let Some(n) = self.graph.node_mut(node_id) {
      n.data.status = NodeStatus::Failed;
      n.data.error = Some(stored);
    }
    self.log.push(
      self.now,
      LogLevel::Error,
      format!("node {}: {}", node_id, message),
      Some(node_id),
    );
    error!(node_id, reason = %message, "node failed");
    TickOutcome::Failed(reason)
  }

  /// `running -> paused`: keeps progress, releases the timer.
  pub fn pause(&mut self, node_id: &str) -> bool {
    let now = self.now;
    let Some(n) = self.graph.node_mut(node_id).filter(|n| n.is_running()) else {
      return false;
    };
    n.data.status = NodeStatus::Paused;
    n.data.paused_at = Some(now);
    self.ctx.timers.release(node_id);
    self.ctx.running.remove(node_id);
    self.ctx.paused.insert(node_id.to_string());
    self.log.push(
      now,
      LogLevel::Info,
      format!("node {} paused at {}%", node_id, n.data.progress),
      Some(node_id),
    );
    true
  }

  /// `paused -> running`, continuing from the stored progress. The paused
  /// interval does not count towards the timeout.
  pub fn resume(&mut self, node_id: &str) -> bool {
    let now = self.now;
    let Some(n) = self
      .graph
      .node_mut(node_id)
      .filter(|n| n.status() == NodeStatus::Paused)
    else {
      return false;
    };
    if let (Some(start), Some(paused_at)) = (n.data.start_time, n.data.paused_at) {
      n.data.start_time = Some(start + (now - paused_at));
    }
    n.data.status = NodeStatus::Running;
    n.data.paused_at = None;
    let progress = n.data.progress;
    self.ctx.paused.remove(node_id);
    self.ctx.running.insert(node_id.to_string());
    let deadline = self.tick_after(now);
    self.ctx.timers.arm(node_id, deadline);
    self.log.push(
      now,
      LogLevel::Info,
      format!("node {} resumed at {}%", node_id, progress),
      Some(node_id),
    );
    info!(node_id, progress, "node resumed");
    true
  }

  /// Manual stop: the node becomes `stopped` at 0%; other nodes are untouched.
  pub fn stop(&mut self, node_id: &str) -> Result<(), PipelineError> {
    let n = self
      .graph
      .node_mut(node_id)
      .ok_or_else(|| PipelineError::NodeNotFound(node_id.to_string()))?;
    n.data.status = NodeStatus::Stopped;
    n.data.progress = 0;
    n.data.paused_at = None;
    self.ctx.forget(node_id);
    self.log.push(
      self.now,
      LogLevel::Warning,
      format!("node {} stopped", node_id),
      Some(node_id),
    );
    Ok(())
  }

  /// Releases every timer and returns every node to {idle, 0}.
  pub fn reset_all(&mut self) {
    let released = self.ctx.timers.release_all();
    self.ctx.running.clear();
    self.ctx.paused.clear();
    self.ctx.scheduled = None;
    self.ctx.deferred = None;
    self.graph.reset_all();
    debug!(released, "all nodes reset");
  }
}
