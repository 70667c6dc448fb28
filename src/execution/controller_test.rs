//! Tests for the pipeline controller.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use super::controller::Pipeline;
use super::driver::run_simulated;
use super::node_machine::StartOutcome;
use crate::clock::ManualClock;
use crate::config::EngineConfig;
use crate::error::{PipelineError, SnapshotError};
use crate::persistence::InMemoryWorkflowStore;
use crate::types::{
  NodeKind, NodeStatus, NoticeLevel, PipelineEdge, PipelineGraph, PipelineNode, PipelineSnapshot,
  PipelineStatus, PipelineVersion, Position,
};

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 4, 2, 8, 0, 0).unwrap()
}

fn chain(kinds: &[NodeKind]) -> PipelineGraph {
  let mut g = PipelineGraph::new();
  let ids: Vec<String> = kinds
    .iter()
    .map(|k| g.add_node(k.clone(), Position::default()))
    .collect();
  for pair in ids.windows(2) {
    g.connect(&pair[0], &pair[1]).unwrap();
  }
  g
}

fn monitors(n: usize) -> PipelineGraph {
  chain(&vec![NodeKind::Monitoring; n])
}

fn pipeline(graph: PipelineGraph) -> (Pipeline, ManualClock) {
  let clock = ManualClock::new(t0());
  let p = Pipeline::new(graph).with_clock(Arc::new(clock.clone()));
  (p, clock)
}

fn step(p: &mut Pipeline, clock: &ManualClock, ms: i64) {
  clock.advance(Duration::milliseconds(ms));
  p.poll();
}

fn status_of(p: &Pipeline, id: &str) -> NodeStatus {
  p.node(id).unwrap().status()
}

fn assert_all_idle(p: &Pipeline) {
  for n in p.graph().nodes() {
    assert_eq!(n.status(), NodeStatus::Idle, "node {}", n.id);
    assert_eq!(n.progress(), 0, "node {}", n.id);
  }
}

#[test]
fn simulation_runs_chain_to_completion() {
  let (mut p, clock) = pipeline(monitors(3));
  p.start_simulation().unwrap();
  assert_eq!(p.status(), PipelineStatus::Running);
  assert_eq!(status_of(&p, "1"), NodeStatus::Running);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);

  run_simulated(&mut p, &clock, 1_000);

  assert_eq!(p.status(), PipelineStatus::Completed);
  assert!(p.is_settled());
  for id in ["1", "2", "3"] {
    assert_eq!(status_of(&p, id), NodeStatus::Completed);
  }
  // 10 ticks per node plus a 500 ms hand-off between nodes
  assert_eq!(
    p.node("3").unwrap().data.completed_at,
    Some(t0() + Duration::milliseconds(31_000))
  );
  let notices = p.take_notices();
  assert_eq!(notices.last().unwrap().level, NoticeLevel::Success);
  assert!(p.take_notices().is_empty());
}

#[test]
fn only_one_chain_node_runs_at_a_time() {
  let (mut p, clock) = pipeline(monitors(3));
  p.start_simulation().unwrap();
  for _ in 0..40 {
    step(&mut p, &clock, 500);
    let running = p.graph().ids_with_status(NodeStatus::Running);
    assert!(running.len() <= 1, "{:?}", running);
  }
}

#[test]
fn next_node_starts_after_advance_delay() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 10_000);
  assert_eq!(status_of(&p, "1"), NodeStatus::Completed);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  assert!(p.context().scheduled.is_some());
  step(&mut p, &clock, 499);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  step(&mut p, &clock, 1);
  assert_eq!(status_of(&p, "2"), NodeStatus::Running);
}

#[test]
fn run_resets_previous_results() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Completed);
  p.start_simulation().unwrap();
  assert_eq!(status_of(&p, "1"), NodeStatus::Running);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  assert_eq!(p.node("2").unwrap().progress(), 0);
}

#[test]
fn running_twice_is_refused_without_changes() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 3_000);
  let before = p.graph().clone();
  p.take_notices();
  assert!(matches!(p.start_simulation(), Err(PipelineError::AlreadyRunning)));
  assert_eq!(p.graph(), &before);
  assert_eq!(p.take_notices()[0].level, NoticeLevel::Warning);
}

#[test]
fn empty_pipeline_is_refused() {
  let (mut p, _clock) = pipeline(PipelineGraph::new());
  assert!(matches!(p.start_simulation(), Err(PipelineError::EmptyPipeline)));
  assert_eq!(p.status(), PipelineStatus::Idle);
}

#[test]
fn cyclic_pipeline_is_refused() {
  let nodes = vec![
    PipelineNode::new("a", NodeKind::Monitoring, Position::default()),
    PipelineNode::new("b", NodeKind::Monitoring, Position::default()),
  ];
  let edges = vec![PipelineEdge::between("a", "b"), PipelineEdge::between("b", "a")];
  let (mut p, _clock) = pipeline(PipelineGraph::from_parts(nodes, edges).unwrap());
  assert!(matches!(p.start_simulation(), Err(PipelineError::CyclicGraph(_))));
  assert!(p.is_settled());
}

#[test]
fn stop_twice_leaves_everything_idle() {
  let (mut p, clock) = pipeline(monitors(3));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 12_000);
  p.stop();
  p.stop();
  assert_eq!(p.status(), PipelineStatus::Idle);
  assert_all_idle(&p);
  assert!(p.is_settled());
  assert!(p.context().running.is_empty());
  assert!(p.context().paused.is_empty());
  assert!(p.context().execution_order.is_empty());
  step(&mut p, &clock, 60_000);
  assert_all_idle(&p);
}

#[test]
fn pause_at_forty_resumes_from_forty() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 4_000);
  assert_eq!(p.node("1").unwrap().progress(), 40);

  p.pause().unwrap();
  assert_eq!(p.status(), PipelineStatus::Paused);
  assert_eq!(status_of(&p, "1"), NodeStatus::Paused);
  assert!(p.context().timers.is_empty());
  assert!(p.context().paused.contains("1"));

  step(&mut p, &clock, 600_000);
  assert_eq!(p.node("1").unwrap().progress(), 40);

  p.resume().unwrap();
  assert_eq!(p.status(), PipelineStatus::Running);
  assert_eq!(status_of(&p, "1"), NodeStatus::Running);
  assert_eq!(p.node("1").unwrap().progress(), 40);
  step(&mut p, &clock, 1_000);
  assert_eq!(p.node("1").unwrap().progress(), 50);

  // the long pause did not eat the timeout budget
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Completed);
}

#[test]
fn pause_during_hand_off_defers_next_start() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 10_000);
  assert!(p.context().scheduled.is_some());
  p.pause().unwrap();
  assert!(p.is_settled());
  step(&mut p, &clock, 5_000);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  p.resume().unwrap();
  assert_eq!(status_of(&p, "2"), NodeStatus::Running);
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Completed);
}

#[test]
fn pause_and_resume_refuse_wrong_states() {
  let (mut p, _clock) = pipeline(monitors(1));
  assert!(matches!(p.pause(), Err(PipelineError::NotRunning)));
  assert!(matches!(p.resume(), Err(PipelineError::NothingToResume)));
  p.start_simulation().unwrap();
  assert!(matches!(p.resume(), Err(PipelineError::NothingToResume)));
}

#[test]
fn validation_failure_halts_the_chain() {
  let (mut p, clock) = pipeline(chain(&[NodeKind::DataLoader, NodeKind::Monitoring]));
  p.start_simulation().unwrap();
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Error);
  assert_eq!(status_of(&p, "1"), NodeStatus::Failed);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  assert!(p.is_settled());
  let last = p.take_notices().pop().unwrap();
  assert_eq!(last.level, NoticeLevel::Error);
  assert!(last.message.contains("data"));
}

#[test]
fn valid_output_lets_the_chain_continue() {
  let (mut p, clock) = pipeline(chain(&[
    NodeKind::DataLoader,
    NodeKind::Preprocessor,
    NodeKind::ModelTrainer,
  ]));
  p.set_output("1", json!({ "data": [[1, 2], [3, 4]] })).unwrap();
  p.set_output("2", json!({ "processedData": [[0.1, 0.2]] })).unwrap();
  p.set_output("3", json!({ "model": "rf-1" })).unwrap();
  p.start_simulation().unwrap();
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Completed);
}

#[test]
fn timeout_fails_node_and_pipeline() {
  let (p, clock) = pipeline(monitors(2));
  let config = EngineConfig::default()
    .with_progress_step(10)
    .with_node_timeout(std::time::Duration::from_secs(3));
  let mut p = p.with_config(config);
  p.start_simulation().unwrap();
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(p.status(), PipelineStatus::Error);
  let n = p.node("1").unwrap();
  assert_eq!(n.status(), NodeStatus::Failed);
  assert_eq!(n.progress(), 30);
  assert!(n.data.error.as_deref().unwrap().contains("timed out"));
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
}

#[test]
fn deleting_running_node_changes_nothing() {
  let (mut p, clock) = pipeline(monitors(3));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 2_000);
  let before = p.graph().clone();
  let err = p.delete_node("1").unwrap_err();
  assert!(matches!(err, PipelineError::NodeRunning(_)));
  assert_eq!(p.graph(), &before);
  assert_eq!(p.graph().edges().len(), 2);
  assert_eq!(p.status(), PipelineStatus::Running);
}

#[test]
fn deleting_idle_node_removes_its_edges() {
  let (mut p, _clock) = pipeline(monitors(3));
  p.delete_node("2").unwrap();
  assert_eq!(p.graph().len(), 2);
  assert!(p.graph().edges().is_empty());
}

#[test]
fn deleting_paused_chain_node_ends_run() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 2_000);
  p.pause().unwrap();
  p.delete_node("1").unwrap();
  assert_eq!(p.status(), PipelineStatus::Idle);
  assert!(p.is_settled());
}

#[test]
fn manual_runs_are_refused_during_a_pipeline_run() {
  let (mut p, _clock) = pipeline(monitors(3));
  p.start_simulation().unwrap();
  assert!(matches!(p.run_node("3"), Err(PipelineError::RunInProgress)));
  p.pause().unwrap();
  assert!(matches!(p.run_node("3"), Err(PipelineError::RunInProgress)));
}

#[test]
fn manual_runs_proceed_concurrently_without_chaining() {
  let (mut p, clock) = pipeline(monitors(3));
  assert_eq!(p.run_node("1").unwrap(), StartOutcome::Started);
  assert_eq!(p.run_node("3").unwrap(), StartOutcome::Started);
  step(&mut p, &clock, 5_000);
  assert_eq!(p.node("1").unwrap().progress(), 50);
  assert_eq!(p.node("3").unwrap().progress(), 50);
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(status_of(&p, "1"), NodeStatus::Completed);
  assert_eq!(status_of(&p, "3"), NodeStatus::Completed);
  assert_eq!(status_of(&p, "2"), NodeStatus::Idle);
  assert_eq!(p.status(), PipelineStatus::Idle);
}

#[test]
fn manual_run_after_failed_upstream_fails() {
  let (mut p, clock) = pipeline(chain(&[NodeKind::DataLoader, NodeKind::Monitoring]));
  p.run_node("1").unwrap();
  run_simulated(&mut p, &clock, 1_000);
  assert_eq!(status_of(&p, "1"), NodeStatus::Failed);
  let err = p.run_node("2").unwrap_err();
  assert!(matches!(err, PipelineError::DependencyFailed { .. }));
  assert_eq!(status_of(&p, "2"), NodeStatus::Failed);
  assert!(p.node("2").unwrap().data.start_time.is_none());
  assert_eq!(p.status(), PipelineStatus::Error);
}

#[test]
fn stopping_chain_node_ends_the_run() {
  let (mut p, clock) = pipeline(monitors(2));
  p.start_simulation().unwrap();
  step(&mut p, &clock, 3_000);
  p.stop_node("1").unwrap();
  assert_eq!(status_of(&p, "1"), NodeStatus::Stopped);
  assert_eq!(p.node("1").unwrap().progress(), 0);
  assert_eq!(p.status(), PipelineStatus::Idle);
  assert!(p.is_settled());
}

#[test]
fn stopping_manual_node_leaves_others_running() {
  let (mut p, clock) = pipeline(monitors(2));
  p.run_node("1").unwrap();
  p.run_node("2").unwrap();
  step(&mut p, &clock, 2_000);
  p.stop_node("1").unwrap();
  assert_eq!(status_of(&p, "1"), NodeStatus::Stopped);
  assert_eq!(status_of(&p, "2"), NodeStatus::Running);
  assert_eq!(p.node("2").unwrap().progress(), 20);
}

#[test]
fn connect_refusals_queue_warnings() {
  let (mut p, _clock) = pipeline(monitors(2));
  assert!(p.connect("2", "1").is_err());
  assert_eq!(p.take_notices()[0].level, NoticeLevel::Warning);
  let id = p.add_node(NodeKind::ModelDeployment, Position::new(1.0, 2.0));
  assert_eq!(id, "3");
  assert_eq!(p.connect("2", "3").unwrap().id, "e2-3");
  assert_eq!(p.disconnect("e2-3").unwrap().target, "3");
}

#[test]
fn export_then_import_reproduces_graph() {
  let (mut p, clock) = pipeline(PipelineGraph::mlops_template());
  p.run_node("1").unwrap();
  step(&mut p, &clock, 3_000);
  p.stop_node("1").unwrap();
  p.run_node("2").unwrap();
  run_simulated(&mut p, &clock, 1_000);
  let snapshot = p.export();
  let text = serde_json::to_string_pretty(&snapshot).unwrap();

  let (mut q, _clock) = pipeline(PipelineGraph::new());
  let parsed: PipelineSnapshot = serde_json::from_str(&text).unwrap();
  q.import(parsed).unwrap();
  assert_eq!(q.graph(), p.graph());
  assert_eq!(q.version(), p.version());
  assert_eq!(status_of(&q, "1"), NodeStatus::Stopped);
  assert_eq!(status_of(&q, "2"), NodeStatus::Completed);
}

#[test]
fn import_keeps_progress_within_bounds() {
  let mut node = PipelineNode::new("1", NodeKind::ModelTraining, Position::default());
  node.data.status = NodeStatus::Paused;
  node.data.progress = 250;
  let snap = PipelineSnapshot {
    nodes: vec![node],
    edges: vec![],
    version: PipelineVersion::new(1, 0, 4),
    exported_at: None,
  };
  let (mut p, _clock) = pipeline(PipelineGraph::new());
  p.import(snap).unwrap();
  assert_eq!(p.node("1").unwrap().progress(), 100);
}

#[test]
fn import_is_refused_while_running() {
  let (mut p, _clock) = pipeline(monitors(1));
  p.start_simulation().unwrap();
  let snap = PipelineSnapshot {
    nodes: vec![],
    edges: vec![],
    version: PipelineVersion::default(),
    exported_at: None,
  };
  assert!(matches!(p.import(snap), Err(PipelineError::RunInProgress)));
  assert_eq!(p.graph().len(), 1);
}

#[test]
fn checkpoint_restore_and_delete_pipeline() {
  let (mut p, _clock) = pipeline(monitors(3));
  let first = p.checkpoint();
  p.delete_node("3").unwrap();
  assert_eq!(p.graph().len(), 2);

  p.delete_pipeline();
  assert!(p.graph().is_empty());
  assert_eq!(p.version(), PipelineVersion::INITIAL);
  assert_eq!(p.checkpoints().len(), 2);
  assert_eq!(p.checkpoints().latest().unwrap().nodes.len(), 2);

  p.restore_checkpoint(&first.id).unwrap();
  assert_eq!(p.graph().len(), 3);
  assert_eq!(p.graph().edges().len(), 2);
  assert!(matches!(
    p.restore_checkpoint("missing"),
    Err(PipelineError::Snapshot(SnapshotError::CheckpointNotFound(_)))
  ));
}

#[tokio::test]
async fn run_saves_and_notifies_before_starting() {
  let store = InMemoryWorkflowStore::new();
  let (mut p, _clock) = pipeline(monitors(2));
  p.run(&store).await.unwrap();
  assert_eq!(store.save_count(), 1);
  assert_eq!(store.run_start_count(), 1);
  assert_eq!(store.graph().len(), 2);
  assert_eq!(p.status(), PipelineStatus::Running);
  assert_eq!(status_of(&p, "1"), NodeStatus::Running);
  assert_eq!(p.version(), PipelineVersion::INITIAL);
}

#[tokio::test]
async fn failed_save_aborts_run() {
  let store = InMemoryWorkflowStore::new();
  store.fail_saves(true);
  let (mut p, _clock) = pipeline(monitors(2));
  let err = p.run(&store).await.unwrap_err();
  assert!(matches!(err, PipelineError::Store(_)));
  assert_eq!(p.status(), PipelineStatus::Idle);
  assert_all_idle(&p);
  assert!(p.is_settled());
  assert_eq!(store.run_start_count(), 0);
}

#[tokio::test]
async fn failed_start_notification_aborts_run() {
  let store = InMemoryWorkflowStore::new();
  store.fail_run_start(true);
  let (mut p, _clock) = pipeline(monitors(2));
  assert!(p.run(&store).await.is_err());
  assert_eq!(p.status(), PipelineStatus::Idle);
  assert_all_idle(&p);
}

#[tokio::test]
async fn save_bumps_patch_only_on_success() {
  let store = InMemoryWorkflowStore::new();
  let (mut p, _clock) = pipeline(monitors(1));
  assert_eq!(p.save(&store).await.unwrap(), PipelineVersion::new(1, 0, 1));
  store.fail_saves(true);
  assert!(p.save(&store).await.is_err());
  assert_eq!(p.version(), PipelineVersion::new(1, 0, 1));
}

#[tokio::test]
async fn load_replaces_graph_and_failure_keeps_it() {
  let store = InMemoryWorkflowStore::with_graph(PipelineGraph::mlops_template());
  let (mut p, _clock) = pipeline(monitors(2));
  p.load(&store).await.unwrap();
  assert_eq!(p.graph().len(), 10);

  let broken = InMemoryWorkflowStore::new();
  broken.fail_loads(true);
  let before = p.graph().clone();
  assert!(p.load(&broken).await.is_err());
  assert_eq!(p.graph(), &before);
}
