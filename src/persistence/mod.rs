//! Where pipelines are stored: the remote workflow store seam with its HTTP
//! and in-memory implementations, plus the local JSON files (exported
//! pipelines, checkpoint history, run log).

pub mod checkpoint_io;
pub mod dto;
pub mod http;
#[cfg(test)]
mod http_test;
pub mod memory;
pub mod run_log_io;
pub mod snapshot_io;
pub mod store;

pub use checkpoint_io::{CHECKPOINTS_FILENAME, load_checkpoints, save_checkpoints};
pub use http::HttpWorkflowStore;
pub use memory::InMemoryWorkflowStore;
pub use run_log_io::{RUN_LOG_FILENAME, load_run_log, write_run_log};
pub use snapshot_io::{export_to_dir, parse_snapshot, read_snapshot, write_snapshot};
pub use store::{RemoteRunState, RunAck, RunStatus, WorkflowStore};
