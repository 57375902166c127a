use std::time::Duration;

use chrono::{NaiveTime, Timelike};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn millis_of_day(t: NaiveTime) -> i64 {
  // Leap-second nanos run past 1e9; fold them into the last millisecond.
  let ms = (t.nanosecond() / 1_000_000).min(999);
  i64::from(t.num_seconds_from_midnight()) * 1000 + i64::from(ms)
}

/// Time from `now` until the next occurrence of `at`, to the millisecond.
///
/// Always in `(0, 24h]`: when `at` equals `now` the trigger waits a full day.
pub fn delay_until(at: NaiveTime, now: NaiveTime) -> Duration {
  let diff = millis_of_day(at) - millis_of_day(now);
  let ms = if diff > 0 { diff } else { DAY_MS + diff };
  Duration::from_millis(ms as u64)
}
