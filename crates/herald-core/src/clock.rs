//! Injectable wall clock.

use chrono::{DateTime, Utc};

/// Source of "now". Anything time-dependent takes one so tests can pin it.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}
