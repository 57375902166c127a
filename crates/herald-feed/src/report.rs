//! HTML rendering of a dataset snapshot for chat messages.

use std::{fmt::Write as _, time::Duration};

use herald_core::dataset::{DatasetRecord, Snapshot};

/// Render the broadcast message for `snapshot`. `elapsed` is how long the
/// refresh that produced it took, as seen by the caller.
pub fn render_report(snapshot: &Snapshot, elapsed: Duration) -> String {
  let mut out = String::new();
  out.push_str("<b>COVID-19 situation update</b>\n");
  out.push_str("Period\tCountry\tRate (14 days)\n");
  out.push_str("<pre>");
  for record in &snapshot.records {
    let _ = writeln!(
      out,
      "{}\t{:<12}\t{:>8.2}{}",
      escape(&record.year_week),
      escape(&record.key),
      record.rate_14_day,
      trend(record),
    );
  }
  out.push_str("</pre>\n");
  let _ = writeln!(out, "{} record(s) in total.", snapshot.records.len());
  let _ = write!(
    out,
    "Data collected on {} ({:.2} sec.)",
    snapshot.collected_at.format("%Y-%m-%d %H:%M:%SZ"),
    elapsed.as_secs_f64(),
  );
  out
}

fn trend(record: &DatasetRecord) -> String {
  let pct = record.delta_pct * 100.0;
  if record.increased {
    format!(" ▲ +{pct:.1}%")
  } else if record.delta_pct < 0.0 {
    format!(" ▼ {pct:.1}%")
  } else {
    String::new()
  }
}

/// Telegram's HTML mode only needs these three escaped.
fn escape(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
