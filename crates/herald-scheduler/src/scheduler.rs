use std::{future::Future, sync::Arc};

use chrono::NaiveTime;
use herald_core::{
  action::Action,
  clock::{Clock, SystemClock},
};
use tokio::task::JoinHandle;

use crate::{Error, Result, delay_until};

/// Whatever runs an action when its trigger fires.
///
/// Failures are the handler's business: it logs them and returns, so one bad
/// run never stops the trigger from firing again tomorrow.
pub trait ActionHandler: Send + Sync + 'static {
  fn fire(&self, action: Action) -> impl Future<Output = ()> + Send + '_;
}

/// A UTC time of day bound to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
  pub at:     NaiveTime,
  pub action: Action,
}

impl Trigger {
  pub fn new(at: NaiveTime, action: Action) -> Self { Self { at, action } }

  /// Parse a `HH:MM:SS` configuration value.
  pub fn parse(at: &str, action: Action) -> Result<Self> {
    NaiveTime::parse_from_str(at.trim(), "%H:%M:%S")
      .map(|at| Self { at, action })
      .map_err(|_| Error::InvalidTime(at.to_owned()))
  }
}

pub struct TriggerScheduler {
  triggers: Vec<Trigger>,
  clock:    Arc<dyn Clock>,
}

impl TriggerScheduler {
  pub fn new(triggers: Vec<Trigger>) -> Self { Self::with_clock(triggers, Arc::new(SystemClock)) }

  pub fn with_clock(triggers: Vec<Trigger>, clock: Arc<dyn Clock>) -> Self {
    Self { triggers, clock }
  }

  /// Arm every trigger. Must be called from within a tokio runtime.
  pub fn start<H: ActionHandler>(self, handler: Arc<H>) -> SchedulerHandle {
    let Self { triggers, clock } = self;
    if triggers.is_empty() {
      tracing::warn!("no triggers configured; scheduler is idle");
    }

    let tasks = triggers
      .into_iter()
      .map(|trigger| tokio::spawn(run_trigger(trigger, handler.clone(), clock.clone())))
      .collect();
    SchedulerHandle { tasks }
  }
}

/// Sleep until `trigger.at`, fire, and re-arm from the wall clock.
///
/// The next delay is computed after the action finishes, so a slow action
/// shifts later occurrences by at most its own duration.
async fn run_trigger<H: ActionHandler>(trigger: Trigger, handler: Arc<H>, clock: Arc<dyn Clock>) {
  let Trigger { at, action } = trigger;
  loop {
    let delay = delay_until(at, clock.now().time());
    tracing::info!(%action, %at, delay_secs = delay.as_secs(), "trigger armed");
    tokio::time::sleep(delay).await;

    tracing::info!(%action, "trigger fired");
    let handler = handler.clone();
    let run = tokio::spawn(async move { handler.fire(action).await });
    if let Err(e) = run.await {
      tracing::error!(%action, error = %e, "action did not complete");
    }
  }
}

/// Owns the trigger tasks. Dropping it disarms every trigger; an action that
/// is already running is left to finish.
pub struct SchedulerHandle {
  tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
  /// Number of armed triggers.
  pub fn len(&self) -> usize { self.tasks.len() }

  pub fn is_empty(&self) -> bool { self.tasks.is_empty() }

  pub fn shutdown(mut self) {
    let count = self.tasks.len();
    self.abort_all();
    tracing::info!(count, "scheduler stopped");
  }

  fn abort_all(&mut self) {
    for task in self.tasks.drain(..) {
      task.abort();
    }
  }
}

impl Drop for SchedulerHandle {
  fn drop(&mut self) { self.abort_all(); }
}
