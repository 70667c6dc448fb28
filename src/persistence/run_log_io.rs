//! Write and load execution.log.json.

use std::path::Path;

use tracing::instrument;

use crate::error::SnapshotError;
use crate::types::RunLog;

/// Default filename for the run log under an output directory.
pub const RUN_LOG_FILENAME: &str = "execution.log.json";

/// Writes the run log to `path`, replacing any previous file. Creates the
/// parent directory if needed.
#[instrument(level = "trace", skip(path, log), fields(entries = log.len()))]
pub fn write_run_log(path: &Path, log: &RunLog) -> Result<(), SnapshotError> {
  let json = serde_json::to_string_pretty(log)?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)?;
  Ok(())
}

/// Loads a run log from `path`. Returns error if file is missing or invalid JSON.
pub fn load_run_log(path: &Path) -> Result<RunLog, SnapshotError> {
  let bytes = std::fs::read(path)?;
  Ok(serde_json::from_slice(&bytes)?)
}
