//! Async driver: sleeps until the pipeline's next deadline and polls it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info};

use super::controller::Pipeline;
use crate::clock::{Clock, ManualClock};
use crate::types::PipelineStatus;

/// Wait used while paused with nothing scheduled; commands wake the loop early.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Shares a [Pipeline] between the driver loop and callers issuing commands.
#[derive(Debug, Clone)]
pub struct PipelineDriver {
  pipeline: Arc<Mutex<Pipeline>>,
  wake: Arc<Notify>,
}

impl PipelineDriver {
  pub fn new(pipeline: Pipeline) -> Self {
    Self {
      pipeline: Arc::new(Mutex::new(pipeline)),
      wake: Arc::new(Notify::new()),
    }
  }

  pub fn pipeline(&self) -> Arc<Mutex<Pipeline>> {
    Arc::clone(&self.pipeline)
  }

  /// Wakes the loop after a command changed the pipeline's deadlines.
  pub fn wake(&self) {
    self.wake.notify_one();
  }

  /// Runs `f` against the pipeline, then wakes the loop.
  pub async fn command<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
    let r = {
      let mut p = self.pipeline.lock().await;
      f(&mut p)
    };
    self.wake();
    r
  }

  /// Polls the pipeline until it settles (nothing left to fire and not
  /// paused) or `shutdown` resolves. On shutdown the pipeline is stopped.
  pub async fn run_until_settled<F>(&self, shutdown: F) -> PipelineStatus
  where
    F: Future<Output = ()>,
  {
    tokio::pin!(shutdown);
    loop {
      let sleep_for = {
        let mut p = self.pipeline.lock().await;
        p.poll();
        if p.is_settled() && p.status() != PipelineStatus::Paused {
          return p.status();
        }
        let now = p.now();
        p
          .next_deadline()
          .map(|at| (at - now).to_std().unwrap_or_default())
          .unwrap_or(IDLE_WAIT)
      };
      debug!(?sleep_for, "driver waiting");
      tokio::select! {
        _ = tokio::time::sleep(sleep_for) => {}
        _ = self.wake.notified() => {}
        _ = &mut shutdown => {
          let mut p = self.pipeline.lock().await;
          info!("shutdown requested, stopping pipeline");
          p.stop();
          return p.status();
        }
      }
    }
  }
}

/// Fires every pending event by jumping `clock` straight to each deadline.
/// `clock` must be the clock the pipeline was built with. Returns the number
/// of events fired; `max_events` bounds the loop.
pub fn run_simulated(pipeline: &mut Pipeline, clock: &ManualClock, max_events: usize) -> usize {
  let mut fired = 0;
  while fired < max_events {
    let Some(at) = pipeline.next_deadline() else {
      break;
    };
    if at > clock.now() {
      clock.set(at);
    }
    let n = pipeline.poll();
    if n == 0 {
      break;
    }
    fired += n;
  }
  fired
}
