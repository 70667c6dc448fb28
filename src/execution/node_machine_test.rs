//! Tests for the node execution state machine.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use super::context::ExecutionContext;
use super::node_machine::{FailureReason, NodeMachine, StartOutcome, TickOutcome};
use crate::config::EngineConfig;
use crate::error::PipelineError;
use crate::types::{
  LogLevel, NodeKind, NodeStatus, PipelineEdge, PipelineGraph, PipelineNode, Position, RunLog,
};

struct Fixture {
  graph: PipelineGraph,
  ctx: ExecutionContext,
  log: RunLog,
  config: EngineConfig,
}

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
}

impl Fixture {
  fn new(nodes: &[(&str, NodeKind)], edges: &[(&str, &str)]) -> Self {
    let nodes = nodes
      .iter()
      .map(|(id, kind)| PipelineNode::new(*id, kind.clone(), Position::default()))
      .collect();
    let edges = edges
      .iter()
      .map(|(s, t)| PipelineEdge::between(*s, *t))
      .collect();
    Self {
      graph: PipelineGraph::from_parts(nodes, edges).unwrap(),
      ctx: ExecutionContext::default(),
      log: RunLog::new(),
      config: EngineConfig::default(),
    }
  }

  fn single() -> Self {
    Self::new(&[("a", NodeKind::Monitoring)], &[])
  }

  fn at(&mut self, now: DateTime<Utc>) -> NodeMachine<'_> {
    NodeMachine {
      graph: &mut self.graph,
      ctx: &mut self.ctx,
      log: &mut self.log,
      config: &self.config,
      now,
    }
  }

  fn node(&self, id: &str) -> &PipelineNode {
    self.graph.node(id).unwrap()
  }

  /// Fires the node's timer at its deadline.
  fn tick(&mut self, id: &str) -> TickOutcome {
    let at = self.ctx.timers.deadline(id).unwrap();
    self.at(at).tick(id)
  }
}

#[test]
fn start_enters_running_and_arms_timer() {
  let mut f = Fixture::single();
  assert_eq!(f.at(t0()).start("a").unwrap(), StartOutcome::Started);
  let n = f.node("a");
  assert_eq!(n.status(), NodeStatus::Running);
  assert_eq!(n.progress(), 0);
  assert_eq!(n.data.start_time, Some(t0()));
  assert!(f.ctx.running.contains("a"));
  assert_eq!(f.ctx.timers.deadline("a"), Some(t0() + Duration::seconds(1)));
  assert_eq!(f.log.at_level(LogLevel::Info).count(), 1);
}

#[test]
fn start_unknown_node_fails() {
  let mut f = Fixture::single();
  assert!(matches!(
    f.at(t0()).start("zzz"),
    Err(PipelineError::NodeNotFound(_))
  ));
}

#[test]
fn failed_predecessor_fails_node_without_running() {
  let mut f = Fixture::new(
    &[("a", NodeKind::Monitoring), ("b", NodeKind::Monitoring)],
    &[("a", "b")],
  );
  f.graph.node_mut("a").unwrap().data.status = NodeStatus::Failed;
  let err = f.at(t0()).start("b").unwrap_err();
  assert!(matches!(err, PipelineError::DependencyFailed { ref node, ref upstream } if node == "b" && upstream == "a"));
  let b = f.node("b");
  assert_eq!(b.status(), NodeStatus::Failed);
  assert!(b.data.error.as_deref().unwrap().contains("upstream"));
  assert!(b.data.start_time.is_none());
  assert!(!f.ctx.running.contains("b"));
  assert!(f.ctx.timers.is_empty());
}

#[test]
fn paused_node_is_skipped_on_start() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  f.tick("a");
  f.at(t0() + Duration::seconds(1)).pause("a");
  let out = f.at(t0() + Duration::seconds(2)).start("a").unwrap();
  assert_eq!(out, StartOutcome::SkippedPaused);
  assert_eq!(f.node("a").progress(), 10);
  assert_eq!(f.node("a").status(), NodeStatus::Paused);
}

#[test]
fn starting_a_running_node_is_a_no_op() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  f.tick("a");
  let out = f.at(t0() + Duration::seconds(1)).start("a").unwrap();
  assert_eq!(out, StartOutcome::AlreadyRunning);
  assert_eq!(f.node("a").progress(), 10);
}

#[test]
fn progress_is_monotonic_and_capped() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  let mut last = 0;
  loop {
    match f.tick("a") {
      TickOutcome::Progressed(p) => {
        assert!(p > last);
        assert!(p <= 100);
        assert_eq!(f.node("a").progress(), p);
        last = p;
      }
      TickOutcome::Completed => break,
      other => panic!("unexpected {:?}", other),
    }
  }
  assert_eq!(last, 90);
  let n = f.node("a");
  assert_eq!(n.status(), NodeStatus::Completed);
  assert_eq!(n.progress(), 100);
  assert_eq!(n.data.completed_at, Some(t0() + Duration::seconds(10)));
  assert!(f.ctx.timers.is_empty());
  assert!(f.ctx.running.is_empty());
}

#[test]
fn uneven_step_still_stops_at_100() {
  let mut f = Fixture::single();
  f.config = EngineConfig::default().with_progress_step(30);
  f.at(t0()).start("a").unwrap();
  let seen: Vec<TickOutcome> = (0..4).map(|_| f.tick("a")).collect();
  assert_eq!(
    seen,
    vec![
      TickOutcome::Progressed(30),
      TickOutcome::Progressed(60),
      TickOutcome::Progressed(90),
      TickOutcome::Completed,
    ]
  );
}

#[test]
fn stale_start_time_times_out_on_next_tick() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  f.tick("a");
  f.graph.node_mut("a").unwrap().data.start_time = Some(t0() - Duration::minutes(6));
  let out = f.tick("a");
  assert_eq!(out, TickOutcome::Failed(FailureReason::Timeout));
  let n = f.node("a");
  assert_eq!(n.status(), NodeStatus::Failed);
  assert!(n.data.error.as_deref().unwrap().contains("timed out"));
  assert_eq!(n.progress(), 10);
  assert!(f.ctx.timers.is_empty());
  assert!(!f.ctx.running.contains("a"));
  assert_eq!(f.log.at_level(LogLevel::Error).count(), 1);
}

#[test]
fn exactly_five_minutes_is_not_a_timeout() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  let at = t0() + Duration::minutes(5);
  assert_eq!(f.at(at).tick("a"), TickOutcome::Progressed(10));
}

#[test]
fn missing_required_output_fails_validation() {
  let mut f = Fixture::new(&[("load", NodeKind::DataLoader)], &[]);
  f.at(t0()).start("load").unwrap();
  let mut out = TickOutcome::Ignored;
  for _ in 0..10 {
    out = f.tick("load");
  }
  match out {
    TickOutcome::Failed(FailureReason::Validation(msg)) => assert!(msg.contains("data")),
    other => panic!("unexpected {:?}", other),
  }
  assert_eq!(f.node("load").status(), NodeStatus::Failed);
  assert!(f.ctx.timers.is_empty());
}

#[test]
fn present_output_passes_validation() {
  let mut f = Fixture::new(&[("load", NodeKind::DataLoader)], &[]);
  f.graph.set_output("load", json!({ "data": [1, 2, 3] })).unwrap();
  f.at(t0()).start("load").unwrap();
  let mut out = TickOutcome::Ignored;
  for _ in 0..10 {
    out = f.tick("load");
  }
  assert_eq!(out, TickOutcome::Completed);
}

#[test]
fn pause_and_resume_keep_progress() {
  let mut f = Fixture::single();
  f.at(t0()).start("a").unwrap();
  for _ in 0..4 {
    f.tick("a");
  }
  assert_eq!(f.node("a").progress(), 40);
  let paused_at = t0() + Duration::seconds(4);
  assert!(f.at(paused_at).pause("a"));
  assert_eq!(f.node("a").status(), NodeStatus::Paused);
  assert!(f.ctx.timers.is_empty());
  assert!(f.ctx.paused.contains("a"));

  let resumed_at = paused_at + Duration::minutes(10);
  assert!(f.at(resumed_at).resume("a"));
  let n = f.node("a");
  assert_eq!(n.status(), NodeStatus::Running);
  assert_eq!(n.progress(), 40);
  // the ten paused minutes do not count towards the timeout
  assert_eq!(n.data.start_time, Some(t0() + Duration::minutes(10)));
  assert_eq!(f.tick("a"), TickOutcome::Progressed(50));
}

#[test]
fn pause_and_resume_ignore_wrong_states() {
  let mut f = Fixture::single();
  assert!(!f.at(t0()).pause("a"));
  assert!(!f.at(t0()).resume("a"));
}

#[test]
fn manual_stop_resets_progress_and_releases_timer() {
  let mut f = Fixture::new(
    &[("a", NodeKind::Monitoring), ("b", NodeKind::Monitoring)],
    &[],
  );
  f.at(t0()).start("a").unwrap();
  f.at(t0()).start("b").unwrap();
  f.tick("a");
  f.at(t0() + Duration::seconds(1)).stop("a").unwrap();
  assert_eq!(f.node("a").status(), NodeStatus::Stopped);
  assert_eq!(f.node("a").progress(), 0);
  assert!(!f.ctx.timers.contains("a"));
  assert_eq!(f.node("b").status(), NodeStatus::Running);
  assert!(f.ctx.timers.contains("b"));
}

#[test]
fn tick_on_non_running_node_releases_stale_timer() {
  let mut f = Fixture::single();
  f.ctx.timers.arm("a", t0());
  assert_eq!(f.at(t0()).tick("a"), TickOutcome::Ignored);
  assert!(f.ctx.timers.is_empty());
}

#[test]
fn reset_all_clears_everything() {
  let mut f = Fixture::new(
    &[("a", NodeKind::Monitoring), ("b", NodeKind::Monitoring)],
    &[],
  );
  f.at(t0()).start("a").unwrap();
  f.at(t0()).start("b").unwrap();
  f.tick("a");
  f.at(t0() + Duration::seconds(1)).pause("b");
  f.at(t0() + Duration::seconds(1)).reset_all();
  assert!(f.ctx.timers.is_empty());
  assert!(f.ctx.running.is_empty());
  assert!(f.ctx.paused.is_empty());
  for id in ["a", "b"] {
    assert_eq!(f.node(id).status(), NodeStatus::Idle);
    assert_eq!(f.node(id).progress(), 0);
  }
}
