//! Error types for the graph model, the execution engine and persistence.

use thiserror::Error;

/// Errors raised by the remote workflow store.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("request to {endpoint} failed: {source}")]
  Http {
    endpoint: String,
    #[source]
    source: reqwest::Error,
  },

  #[error("{endpoint} returned {status}: {body}")]
  Status {
    endpoint: String,
    status: u16,
    body: String,
  },

  #[error("unexpected response from {endpoint}: {reason}")]
  InvalidResponse { endpoint: String, reason: String },

  #[error("workflow store unavailable: {0}")]
  Unavailable(String),
}

/// Errors raised while reading or writing snapshot, checkpoint and log files.
#[derive(Debug, Error)]
pub enum SnapshotError {
  #[error("snapshot file could not be read or written: {0}")]
  Io(#[from] std::io::Error),

  #[error("snapshot is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("invalid pipeline file: missing top-level `{0}`")]
  MissingKey(&'static str),

  #[error("checkpoint not found: {0}")]
  CheckpointNotFound(String),
}

/// Errors raised by the graph model, the node state machine and the controller.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error("node {0} not found")]
  NodeNotFound(String),

  #[error("node {0} already exists")]
  DuplicateNode(String),

  #[error("edge {0} not found")]
  EdgeNotFound(String),

  #[error("nodes {from} and {to} are already connected")]
  DuplicateEdge { from: String, to: String },

  #[error("node {0} cannot depend on itself")]
  SelfLoop(String),

  #[error("connecting {from} -> {to} would create a cycle")]
  WouldCycle { from: String, to: String },

  #[error("pipeline graph contains a cycle through {0:?}")]
  CyclicGraph(Vec<String>),

  #[error("node {0} is running and cannot be deleted")]
  NodeRunning(String),

  #[error("an upstream node of {node} failed ({upstream})")]
  DependencyFailed { node: String, upstream: String },

  #[error("pipeline is already running")]
  AlreadyRunning,

  #[error("pipeline has no nodes to run")]
  EmptyPipeline,

  #[error("pipeline is not running")]
  NotRunning,

  #[error("no paused node to resume")]
  NothingToResume,

  #[error("pipeline run in progress; stop it first")]
  RunInProgress,

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Snapshot(#[from] SnapshotError),
}
