//! CLI: Run an MLOps pipeline simulation.
//!
//! Loads a pipeline from an exported file, from the backend (`--backend`), or
//! falls back to the ten-step MLOps template; saves it to the store, notifies
//! the run start, then simulates until every node settled.
//!
//! Usage: `run_pipeline [OPTIONS] [pipeline.json]`
//! Example: run_pipeline --export --out-dir /tmp/run pipeline-1.0.3-2026-07-09.json
//!
//! The run log is written to <out-dir>/execution.log.json.
//!
//! Set RUST_LOG=mlops_pipeline=trace for TRACE-level span enter/exit and events.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use mlops_pipeline::config::{EngineConfig, SaveMode, StoreConfig};
use mlops_pipeline::persistence::{
  CHECKPOINTS_FILENAME, HttpWorkflowStore, InMemoryWorkflowStore, RUN_LOG_FILENAME, WorkflowStore,
  export_to_dir, load_checkpoints, read_snapshot, save_checkpoints, write_run_log,
};
use mlops_pipeline::types::{NoticeLevel, PipelineGraph, PipelineStatus};
use mlops_pipeline::{Clock, ManualClock, Pipeline, PipelineDriver, SystemClock, run_simulated};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

const OUT_DIR: &str = ".pipeline";

/// Run an MLOps pipeline simulation.
#[derive(Parser, Debug)]
#[command(name = "run_pipeline")]
#[command(
  after_help = r#"Environment variables (override the matching flags when set):
  MLOPS_BACKEND_API_URL        Backend base URL (--backend-url)
  PIPELINE_TICK_MS             Progress tick period (--tick-ms)
  PIPELINE_NODE_TIMEOUT_SECS   Per-node timeout (--timeout-secs)
  PIPELINE_ADVANCE_DELAY_MS    Delay before the next node starts (--advance-ms)
  PIPELINE_SAVE_MODE           per-entity | replace (--save-mode)

Examples:
  run_pipeline
  run_pipeline --backend --real-time
  run_pipeline --export --checkpoint pipeline-1.0.3-2026-07-09.json"#
)]
struct Args {
  /// Exported pipeline file. Without it (and without --backend) the MLOps template is used.
  #[arg(value_name = "pipeline.json")]
  pipeline: Option<PathBuf>,

  /// Load from, save to and report the run to the backend instead of an in-memory store.
  #[arg(long)]
  backend: bool,

  /// Backend base URL. Overridden by MLOPS_BACKEND_API_URL if set.
  #[arg(long, value_name = "URL", default_value = "http://localhost:8000")]
  backend_url: String,

  /// How saves replace the stored graph: `per-entity` uses the backend's add and delete
  /// routes, `replace` a single PUT. Overridden by PIPELINE_SAVE_MODE if set.
  #[arg(long, value_name = "MODE", default_value = "per-entity")]
  save_mode: SaveMode,

  /// Progress tick period in milliseconds.
  #[arg(long, value_name = "MS", default_value_t = 1000)]
  tick_ms: u64,

  /// Fail a node that runs longer than this.
  #[arg(long, value_name = "SECS", default_value_t = 300)]
  timeout_secs: u64,

  /// Delay between a node completing and the next node starting.
  #[arg(long, value_name = "MS", default_value_t = 500)]
  advance_ms: u64,

  /// Wait out every tick in real time (Ctrl-C stops the run) instead of simulating time.
  #[arg(long)]
  real_time: bool,

  /// Upper bound on simulated events.
  #[arg(long, value_name = "N", default_value_t = 1_000_000)]
  max_events: usize,

  /// Directory for the run log, exports and checkpoint history.
  #[arg(long, value_name = "DIR", default_value = OUT_DIR)]
  out_dir: PathBuf,

  /// Write the final pipeline as pipeline-{version}-{date}.json into --out-dir.
  #[arg(long)]
  export: bool,

  /// Record a checkpoint of the loaded pipeline before running.
  #[arg(long)]
  checkpoint: bool,
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::ENTER | FmtSpan::EXIT)
    .init();

  info!("run_pipeline starting");
  let args = Args::parse();

  // Env vars override flags.
  let engine = EngineConfig::default()
    .with_tick_interval(Duration::from_millis(args.tick_ms))
    .with_node_timeout(Duration::from_secs(args.timeout_secs))
    .with_advance_delay(Duration::from_millis(args.advance_ms))
    .with_env_overrides();
  let store_config = StoreConfig::default()
    .with_base_url(args.backend_url.clone())
    .with_save_mode(args.save_mode)
    .with_env_overrides();
  info!(?engine, base_url = %store_config.base_url, save_mode = %store_config.save_mode, backend = args.backend, "options (env or flags)");

  let store: Box<dyn WorkflowStore> = if args.backend {
    match HttpWorkflowStore::new(store_config) {
      Ok(s) => Box::new(s),
      Err(e) => {
        eprintln!("Error creating backend client: {}", e);
        process::exit(1);
      }
    }
  } else {
    Box::new(InMemoryWorkflowStore::with_graph(PipelineGraph::mlops_template()))
  };

  let checkpoints_path = args.out_dir.join(CHECKPOINTS_FILENAME);
  let history = load_checkpoints(&checkpoints_path).unwrap_or_else(|e| {
    warn!(path = %checkpoints_path.display(), error = %e, "ignoring unreadable checkpoint history");
    Default::default()
  });

  let manual = (!args.real_time).then(|| ManualClock::new(Utc::now()));
  let clock: Arc<dyn Clock> = match &manual {
    Some(c) => Arc::new(c.clone()),
    None => Arc::new(SystemClock),
  };
  let mut pipeline = Pipeline::new(PipelineGraph::new())
    .with_config(engine)
    .with_clock(clock)
    .with_checkpoints(history);

  let loaded = match &args.pipeline {
    Some(path) => read_snapshot(path)
      .map_err(|e| format!("Error reading {}: {}", path.display(), e))
      .and_then(|snap| pipeline.import(snap).map_err(|e| format!("Error importing: {}", e))),
    None => pipeline
      .load(store.as_ref())
      .await
      .map_err(|e| format!("Error loading pipeline: {}", e)),
  };
  if let Err(msg) = loaded {
    eprintln!("{}", msg);
    process::exit(1);
  }
  info!(nodes = pipeline.graph().len(), version = %pipeline.version(), "pipeline loaded");

  if args.checkpoint {
    pipeline.checkpoint();
  }

  if let Err(e) = pipeline.run(store.as_ref()).await {
    eprintln!("Pipeline error: {}", e);
    write_outputs(&args, &mut pipeline);
    process::exit(1);
  }

  let driver = PipelineDriver::new(pipeline);
  let shared = driver.pipeline();
  let status = match &manual {
    Some(clock) => {
      let mut p = shared.lock().await;
      let fired = run_simulated(&mut p, clock, args.max_events);
      info!(events = fired, "simulation finished");
      p.status()
    }
    None => {
      driver
        .run_until_settled(async {
          if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
          }
        })
        .await
    }
  };

  if args.backend {
    match store.run_status().await {
      Ok(remote) => info!(status = ?remote.status, message = %remote.message, "backend flow status"),
      Err(e) => warn!(error = %e, "backend flow status unavailable"),
    }
  }

  let mut p = shared.lock().await;
  write_outputs(&args, &mut p);

  for notice in p.take_notices() {
    let tag = match notice.level {
      NoticeLevel::Info => "info",
      NoticeLevel::Success => "ok",
      NoticeLevel::Warning => "warn",
      NoticeLevel::Error => "error",
    };
    println!("[{}] {}: {}", tag, notice.title, notice.message);
  }
  info!(status = %status, "pipeline finished");
  println!("Pipeline finished.");
  println!("  Status: {}", status);
  println!("  Version: {}", p.version());
  for n in p.graph().nodes() {
    println!(
      "  {:>3} {:<22} {:<9} {:>3}%{}",
      n.id,
      n.data.label,
      n.status().to_string(),
      n.progress(),
      n.data
        .error
        .as_deref()
        .map(|e| format!("  ({})", e))
        .unwrap_or_default()
    );
  }
  if status != PipelineStatus::Completed {
    process::exit(1);
  }
}

/// Writes the run log, the optional export and the checkpoint history.
/// Failures are reported but do not change the exit status.
fn write_outputs(args: &Args, pipeline: &mut Pipeline) {
  let log_path = args.out_dir.join(RUN_LOG_FILENAME);
  if let Err(e) = write_run_log(&log_path, pipeline.logs()) {
    eprintln!("Error writing {}: {}", log_path.display(), e);
  }
  if args.export {
    let snapshot = pipeline.export();
    match export_to_dir(&args.out_dir, &snapshot) {
      Ok(path) => println!("Exported {}", path.display()),
      Err(e) => eprintln!("Error exporting pipeline: {}", e),
    }
  }
  if args.checkpoint {
    let path = args.out_dir.join(CHECKPOINTS_FILENAME);
    if let Err(e) = save_checkpoints(&path, pipeline.checkpoints()) {
      eprintln!("Error writing {}: {}", path.display(), e);
    }
  }
}
