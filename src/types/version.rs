//! Pipeline version (`major.minor.patch`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Pipeline version. Serialized as its dotted string; missing trailing
/// components parse as zero (`"1.0"` is `1.0.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PipelineVersion {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
}

impl PipelineVersion {
  pub const INITIAL: PipelineVersion = PipelineVersion {
    major: 1,
    minor: 0,
    patch: 0,
  };

  pub fn new(major: u32, minor: u32, patch: u32) -> Self {
    Self {
      major,
      minor,
      patch,
    }
  }

  /// Next patch version; saving a pipeline bumps it.
  pub fn bump_patch(self) -> Self {
    Self {
      patch: self.patch.saturating_add(1),
      ..self
    }
  }
}

impl Default for PipelineVersion {
  fn default() -> Self {
    Self::INITIAL
  }
}

impl fmt::Display for PipelineVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

impl FromStr for PipelineVersion {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim().trim_start_matches('v');
    let mut parts = [0u32; 3];
    for (i, part) in s.split('.').enumerate() {
      if i >= 3 {
        return Err(format!("invalid version {:?}: too many components", s));
      }
      parts[i] = part
        .parse()
        .map_err(|_| format!("invalid version {:?}: {:?} is not a number", s, part))?;
    }
    Ok(Self::new(parts[0], parts[1], parts[2]))
  }
}

impl TryFrom<String> for PipelineVersion {
  type Error = String;

  fn try_from(s: String) -> Result<Self, Self::Error> {
    s.parse()
  }
}

impl From<PipelineVersion> for String {
  fn from(v: PipelineVersion) -> Self {
    v.to_string()
  }
}
