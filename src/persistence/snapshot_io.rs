//! Export/import of pipeline files (JSON).

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::instrument;

use crate::error::SnapshotError;
use crate::types::PipelineSnapshot;

/// Writes `snapshot` into `dir` under its export file name; returns the path.
#[instrument(level = "trace", skip(dir, snapshot))]
pub fn export_to_dir(dir: &Path, snapshot: &PipelineSnapshot) -> Result<PathBuf, SnapshotError> {
  let path = dir.join(snapshot.file_name());
  write_snapshot(&path, snapshot)?;
  Ok(path)
}

/// Writes `snapshot` to `path` as pretty JSON, creating parent directories.
#[instrument(level = "trace", skip(path, snapshot))]
pub fn write_snapshot(path: &Path, snapshot: &PipelineSnapshot) -> Result<(), SnapshotError> {
  let json = serde_json::to_string_pretty(snapshot)?;
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, json)?;
  Ok(())
}

/// Reads a pipeline file. Both `nodes` and `edges` must be present.
#[instrument(level = "trace", skip(path))]
pub fn read_snapshot(path: &Path) -> Result<PipelineSnapshot, SnapshotError> {
  let text = std::fs::read_to_string(path)?;
  parse_snapshot(&text)
}

/// Parses pipeline file contents. Both `nodes` and `edges` must be present.
pub fn parse_snapshot(text: &str) -> Result<PipelineSnapshot, SnapshotError> {
  let value: Value = serde_json::from_str(text)?;
  for key in ["nodes", "edges"] {
    if value.get(key).is_none() {
      return Err(SnapshotError::MissingKey(key));
    }
  }
  Ok(serde_json::from_value(value)?)
}
