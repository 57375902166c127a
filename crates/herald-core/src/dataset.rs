//! Dataset records and the immutable snapshot served by the feed cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The form keys and regions are compared in. Full Unicode lowercasing, so
/// `Türkiye` and `TÜRKIYE` name the same record.
pub fn fold_key(key: &str) -> String { key.to_lowercase() }

/// Whether two keys name the same record.
pub fn same_key(a: &str, b: &str) -> bool { a == b || fold_key(a) == fold_key(b) }

/// One entry of the remote dataset, keyed by country.
///
/// `increased` and `delta_pct` are derived by comparing against the previous
/// snapshot; they are never fetched and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
  pub key:              String,
  pub continent:        String,
  pub year_week:        String,
  pub weekly_count:     i64,
  pub cumulative_count: i64,
  /// Ranking metric.
  pub rate_14_day:      f64,
  pub increased:        bool,
  pub delta_pct:        f64,
}

impl DatasetRecord {
  pub fn metric(&self) -> f64 { self.rate_14_day }
}

/// A committed view of the dataset. Replaced wholesale, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
  pub records:      Vec<DatasetRecord>,
  pub collected_at: DateTime<Utc>,
}

impl Snapshot {
  pub fn get(&self, key: &str) -> Option<&DatasetRecord> {
    self.records.iter().find(|r| same_key(&r.key, key))
  }
}
