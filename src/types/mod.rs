//! Pipeline graph types: nodes, edges, statuses, snapshots and the run log.
//!
//! Every type here serializes to the JSON shape used by the workflow backend
//! and by exported pipeline files.

mod node_kind;
mod node_status;
mod notice;
mod pipeline_edge;
mod pipeline_graph;
mod pipeline_node;
mod pipeline_status;
mod run_log;
mod snapshot;
mod version;

pub use node_kind::{NodeKind, OutputRequirement, ParamMap};
pub use node_status::NodeStatus;
pub use notice::{Notice, NoticeLevel};
pub use pipeline_edge::{DEFAULT_EDGE_TYPE, EdgeStyle, PipelineEdge};
pub use pipeline_graph::PipelineGraph;
pub use pipeline_node::{MAX_PROGRESS, NODE_RENDER_TYPE, NodeData, PipelineNode, Position};
pub use pipeline_status::PipelineStatus;
pub use run_log::{LogEntry, LogLevel, RunLog};
pub use snapshot::{Checkpoint, CheckpointHistory, MAX_CHECKPOINTS, PipelineSnapshot};
pub use version::PipelineVersion;
