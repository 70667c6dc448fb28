//! Engine and workflow store configuration.
//!
//! Both configs have sensible defaults, `with_*` builders, and `from_env()`
//! which overrides defaults from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Backend base URL variable.
pub const ENV_BACKEND_URL: &str = "MLOPS_BACKEND_API_URL";
/// Progress tick period in milliseconds.
pub const ENV_TICK_MS: &str = "PIPELINE_TICK_MS";
/// Per-node timeout in seconds.
pub const ENV_NODE_TIMEOUT_SECS: &str = "PIPELINE_NODE_TIMEOUT_SECS";
/// Delay between a node completing and the next chain node starting.
pub const ENV_ADVANCE_DELAY_MS: &str = "PIPELINE_ADVANCE_DELAY_MS";
/// `replace` or `per-entity`.
pub const ENV_SAVE_MODE: &str = "PIPELINE_SAVE_MODE";

/// Shortest accepted tick period.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Timing of the simulated execution.
///
/// Fields are only set through the builders, which keep the tick period
/// positive and the progress step within 1..=100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
  tick_interval: Duration,
  progress_step: u8,
  node_timeout: Duration,
  advance_delay: Duration,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      tick_interval: Duration::from_millis(1000),
      progress_step: 10,
      node_timeout: Duration::from_secs(5 * 60),
      advance_delay: Duration::from_millis(500),
    }
  }
}

impl EngineConfig {
  pub fn from_env() -> Self {
    Self::default().with_env_overrides()
  }

  /// Replaces fields whose environment variable is set and valid.
  pub fn with_env_overrides(self) -> Self {
    let mut config = self;
    if let Some(ms) = parse_env::<u64>(ENV_TICK_MS) {
      config = config.with_tick_interval(Duration::from_millis(ms));
    }
    if let Some(secs) = parse_env::<u64>(ENV_NODE_TIMEOUT_SECS) {
      config.node_timeout = Duration::from_secs(secs);
    }
    if let Some(ms) = parse_env::<u64>(ENV_ADVANCE_DELAY_MS) {
      config.advance_delay = Duration::from_millis(ms);
    }
    config
  }

  /// Period between progress ticks.
  pub fn tick_interval(&self) -> Duration {
    self.tick_interval
  }

  /// Progress added per tick.
  pub fn progress_step(&self) -> u8 {
    self.progress_step
  }

  /// A running node that exceeds this since its start fails with a timeout.
  pub fn node_timeout(&self) -> Duration {
    self.node_timeout
  }

  /// Delay between a chain node completing and the next one starting.
  pub fn advance_delay(&self) -> Duration {
    self.advance_delay
  }

  /// Raised to [MIN_TICK_INTERVAL] so ticks always move the clock forward.
  pub fn with_tick_interval(mut self, tick: Duration) -> Self {
    self.tick_interval = tick.max(MIN_TICK_INTERVAL);
    self
  }

  /// Clamped to 1..=100 so every running node eventually reaches 100.
  pub fn with_progress_step(mut self, step: u8) -> Self {
    self.progress_step = step.clamp(1, 100);
    self
  }

  pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
    self.node_timeout = timeout;
    self
  }

  pub fn with_advance_delay(mut self, delay: Duration) -> Self {
    self.advance_delay = delay;
    self
  }
}

/// How a save replaces the remote graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SaveMode {
  /// One `PUT /api/workflows` carrying the whole graph. Needs a backend that
  /// serves that route.
  Replace,
  /// Delete all edges, delete all nodes, then POST each node and edge.
  #[default]
  PerEntity,
}

impl FromStr for SaveMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "replace" | "atomic" => Ok(SaveMode::Replace),
      "per-entity" | "per_entity" | "legacy" => Ok(SaveMode::PerEntity),
      other => Err(format!("unknown save mode {:?}", other)),
    }
  }
}

impl fmt::Display for SaveMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      SaveMode::Replace => "replace",
      SaveMode::PerEntity => "per-entity",
    })
  }
}

/// Connection settings for the remote workflow store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
  pub base_url: String,
  pub request_timeout: Duration,
  pub save_mode: SaveMode,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:8000".to_string(),
      request_timeout: Duration::from_secs(30),
      save_mode: SaveMode::default(),
    }
  }
}

impl StoreConfig {
  pub fn from_env() -> Self {
    Self::default().with_env_overrides()
  }

  /// Replaces fields whose environment variable is set and valid.
  pub fn with_env_overrides(self) -> Self {
    let mut config = self;
    if let Some(url) = env::var(ENV_BACKEND_URL).ok().filter(|u| !u.trim().is_empty()) {
      config.base_url = url;
    }
    if let Some(mode) = parse_env::<SaveMode>(ENV_SAVE_MODE) {
      config.save_mode = mode;
    }
    config
  }

  pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
    self.base_url = url.into();
    self
  }

  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout = timeout;
    self
  }

  pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
    self.save_mode = mode;
    self
  }

  /// `base_url` joined with `path`, without doubled slashes.
  pub fn endpoint(&self, path: &str) -> String {
    format!(
      "{}/{}",
      self.base_url.trim_end_matches('/'),
      path.trim_start_matches('/')
    )
  }
}

/// Reads and parses `name`; unset is `None`, unparsable is logged and ignored.
fn parse_env<T>(name: &str) -> Option<T>
where
  T: FromStr,
  T::Err: fmt::Display,
{
  let raw = env::var(name).ok()?;
  match raw.parse::<T>() {
    Ok(v) => Some(v),
    Err(e) => {
      warn!(var = name, value = %raw, error = %e, "ignoring invalid environment value");
      None
    }
  }
}
