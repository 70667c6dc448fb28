//! # mlops-pipeline
//!
//! Pipeline graph editing and execution simulation for an MLOps dashboard.
//!
//! ## Architecture
//!
//! - `types`: graph model (nodes, edges, statuses, version, snapshots, run log).
//! - `resolver`: dependency-respecting execution order and cycle detection.
//! - `execution`: execution context, per-node state machine, and the
//!   [Pipeline] controller that runs, pauses, resumes and stops a pipeline.
//!   Progress is timer driven; `Pipeline::poll` fires due timers against a
//!   [Clock], and [PipelineDriver] drives that loop in real time.
//! - `persistence`: the [WorkflowStore] seam (REST backend or in-memory) and
//!   the JSON export, checkpoint and run log files.

pub mod clock;
pub mod config;
pub mod error;
pub mod execution;
pub mod persistence;
pub mod resolver;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, SaveMode, StoreConfig};
pub use error::{PipelineError, SnapshotError, StoreError};
pub use execution::{Pipeline, PipelineDriver, run_simulated};
pub use persistence::{HttpWorkflowStore, InMemoryWorkflowStore, WorkflowStore};
pub use resolver::{execution_order, find_cycle};
pub use types::{
  NodeKind, NodeStatus, PipelineEdge, PipelineGraph, PipelineNode, PipelineSnapshot, PipelineStatus,
  PipelineVersion,
};
