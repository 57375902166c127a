//! Process uptime report.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy)]
pub struct Uptime {
  started_at: DateTime<Utc>,
  started:    Instant,
}

impl Uptime {
  pub fn start() -> Self { Self { started_at: Utc::now(), started: Instant::now() } }


  pub fn elapsed(&self) -> Duration { self.started.elapsed() }

  pub fn report(&self) -> String {
    format!(
      "Herald <pre>v{}</pre>\n<b>Started:</b> {}\n<b>Uptime:</b> {}",
      env!("CARGO_PKG_VERSION"),
      self.started_at.format("%Y-%m-%d %H:%M:%SZ"),
      format_duration(self.elapsed()),
    )
  }
}

/// `N day(s) HHh:MMm:SSs`
pub fn format_duration(d: Duration) -> String {
  let secs = d.as_secs();
  format!(
    "{} day(s) {:02}h:{:02}m:{:02}s",
    secs / 86_400,
    secs % 86_400 / 3600,
    secs % 3600 / 60,
    secs % 60,
  )
}
