//! User-facing notifications (toasts) emitted by the controller.

use serde::{Deserialize, Serialize};

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
  Info,
  Success,
  Warning,
  Error,
}

/// A short notification for whoever drives the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
  pub level: NoticeLevel,
  pub title: String,
  pub message: String,
}

impl Notice {
  pub fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      level,
      title: title.into(),
      message: message.into(),
    }
  }

  pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(NoticeLevel::Info, title, message)
  }

  pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(NoticeLevel::Success, title, message)
  }

  pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(NoticeLevel::Warning, title, message)
  }

  pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
    Self::new(NoticeLevel::Error, title, message)
  }
}
