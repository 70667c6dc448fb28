//! User-facing run log: timestamped info/warning/error entries recorded by the
//! controller and the node state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a run log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Info,
  Warning,
  Error,
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      LogLevel::Info => "info",
      LogLevel::Warning => "warning",
      LogLevel::Error => "error",
    })
  }
}

/// One recorded line in the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  pub message: String,
  /// Node the entry is about, if any.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub node_id: Option<String>,
}

/// Root structure for the persisted run log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunLog {
  pub entries: Vec<LogEntry>,
}

impl RunLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(
    &mut self,
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: impl Into<String>,
    node_id: Option<&str>,
  ) {
    self.entries.push(LogEntry {
      timestamp,
      level,
      message: message.into(),
      node_id: node_id.map(str::to_string),
    });
  }

  pub fn entries(&self) -> &[LogEntry] {
    &self.entries
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Entries at `level`, oldest first.
  pub fn at_level(&self, level: LogLevel) -> impl Iterator<Item = &LogEntry> {
    self.entries.iter().filter(move |e| e.level == level)
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}
