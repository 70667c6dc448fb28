//! Checkpoint history save/load (JSON).

use std::path::Path;

use tracing::instrument;

use crate::error::SnapshotError;
use crate::types::CheckpointHistory;

/// Default filename for the checkpoint history.
pub const CHECKPOINTS_FILENAME: &str = "checkpoints.json";

/// Saves the history to `path` as JSON.
#[instrument(level = "trace", skip(path, history), fields(count = history.len()))]
pub fn save_checkpoints(path: &Path, history: &CheckpointHistory) -> Result<(), SnapshotError> {
  let json = serde_json::to_string_pretty(history)?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)?;
  Ok(())
}

/// Loads the history from `path`. A missing file is an empty history; only
/// the newest entries up to the cap are kept.
#[instrument(level = "trace", skip(path))]
pub fn load_checkpoints(path: &Path) -> Result<CheckpointHistory, SnapshotError> {
  let bytes = match std::fs::read(path) {
    Ok(b) => b,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CheckpointHistory::new()),
    Err(e) => return Err(e.into()),
  };
  let stored: CheckpointHistory = serde_json::from_slice(&bytes)?;
  let mut history = CheckpointHistory::new();
  for cp in stored.iter() {
    history.push(cp.clone());
  }
  Ok(history)
}
