//! The single-flight dataset cache.
//!
//! Readers call [`DatasetCache::current_snapshot`] and get an `Arc` to an
//! immutable [`Snapshot`]; they never wait for a refresh. Writers go through
//! [`DatasetCache::refresh`], which serializes on an async mutex and counts
//! attempts so that callers queued behind an in-flight refresh reuse its
//! outcome, success or failure, instead of fetching again.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
  time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use herald_core::{
  clock::{Clock, SystemClock},
  dataset::{DatasetRecord, Snapshot, fold_key, same_key},
};
use tokio::sync::Mutex;

use crate::{DatasetSource, Error, Result, decode};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// When a snapshot stops being served without a refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Staleness {
  /// Fresh while the snapshot was collected on the current UTC date.
  #[default]
  CalendarDay,
  /// Fresh for a fixed time after collection.
  MaxAge(Duration),
}

impl Staleness {
  pub fn is_stale(&self, collected_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    match self {
      Self::CalendarDay => collected_at.date_naive() != now.date_naive(),
      Self::MaxAge(max) => (now - collected_at)
        .to_std()
        .map(|age| age >= *max)
        // Collected "in the future": the clock moved backwards.
        .unwrap_or(false),
    }
  }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
  /// Only records whose continent matches (case-insensitively) are kept.
  pub region:        String,
  pub fetch_timeout: Duration,
  pub staleness:     Staleness,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      region:        "Europe".to_owned(),
      fetch_timeout: Duration::from_secs(60),
      staleness:     Staleness::CalendarDay,
    }
  }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Slot {
  /// Bumped once per finished fetch attempt, whatever its outcome.
  attempt:  u64,
  snapshot: Option<Arc<Snapshot>>,
  /// Set when the latest attempt failed.
  failure:  Option<Error>,
}

pub struct DatasetCache<S> {
  source: S,
  config: CacheConfig,
  clock:  Arc<dyn Clock>,
  slot:   RwLock<Slot>,
  flight: Mutex<()>,
}

impl<S: DatasetSource> DatasetCache<S> {
  pub fn new(source: S, config: CacheConfig) -> Self {
    Self::with_clock(source, config, Arc::new(SystemClock))
  }

  pub fn with_clock(source: S, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
    Self {
      source,
      config,
      clock,
      slot: RwLock::new(Slot::default()),
      flight: Mutex::new(()),
    }
  }

  fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
    self.slot.read().unwrap_or_else(PoisonError::into_inner)
  }

  /// The last committed snapshot, if any refresh has succeeded yet.
  pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> { self.read_slot().snapshot.clone() }

  pub fn is_stale(&self) -> bool {
    match &self.read_slot().snapshot {
      Some(s) => self.config.staleness.is_stale(s.collected_at, self.clock.now()),
      None => true,
    }
  }

  /// Bring the snapshot up to date and return it.
  ///
  /// Without `force`, a fresh snapshot is returned as is. Callers that queued
  /// up behind another refresh get that refresh's outcome, forced or not,
  /// including its error. On any failure the previous snapshot stays in place.
  pub async fn refresh(&self, force: bool) -> Result<Arc<Snapshot>> {
    let seen = self.read_slot().attempt;
    let _flight = self.flight.lock().await;

    let prior = {
      let slot = self.read_slot();
      if slot.attempt != seen {
        tracing::debug!(failed = slot.failure.is_some(), "joined an in-flight refresh");
        match (&slot.failure, &slot.snapshot) {
          (Some(err), _) => return Err(err.replay()),
          (None, Some(snapshot)) => return Ok(snapshot.clone()),
          (None, None) => {}
        }
      }
      slot.snapshot.clone()
    };

    if let Some(snapshot) = &prior {
      if !force && !self.config.staleness.is_stale(snapshot.collected_at, self.clock.now()) {
        return Ok(snapshot.clone());
      }
    }

    let started = Instant::now();
    let outcome = self.fetch_snapshot(prior.as_deref()).await;
    {
      let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
      slot.attempt += 1;
      match &outcome {
        Ok(snapshot) => {
          slot.snapshot = Some(snapshot.clone());
          slot.failure = None;
        }
        Err(err) => slot.failure = Some(err.replay()),
      }
    }

    match &outcome {
      Ok(snapshot) => tracing::info!(
        kept = snapshot.records.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        forced = force,
        "dataset refreshed",
      ),
      Err(err) => tracing::warn!(
        error = %err,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataset refresh failed",
      ),
    }
    outcome
  }

  async fn fetch_snapshot(&self, prior: Option<&Snapshot>) -> Result<Arc<Snapshot>> {
    let body = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch())
      .await
      .map_err(|_| {
        Error::Fetch(format!("timed out after {:?}", self.config.fetch_timeout))
      })??;

    let records = decode::decode(&body)?;
    tracing::debug!(fetched = records.len(), "dataset decoded");
    let records = diff(rank(dedupe(normalize(records, &self.config.region))), prior);
    Ok(Arc::new(Snapshot { records, collected_at: self.clock.now() }))
  }
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Keep records from `region` only.
pub fn normalize(records: Vec<DatasetRecord>, region: &str) -> Vec<DatasetRecord> {
  records.into_iter().filter(|r| same_key(&r.continent, region)).collect()
}

/// One record per key; the first occurrence wins. Keys compare by
/// [`fold_key`].
pub fn dedupe(records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
  let mut seen = HashSet::with_capacity(records.len());
  records.into_iter().filter(|r| seen.insert(fold_key(&r.key))).collect()
}

/// Highest metric first; equal metrics in key order.
pub fn rank(mut records: Vec<DatasetRecord>) -> Vec<DatasetRecord> {
  records.sort_by(|a, b| b.metric().total_cmp(&a.metric()).then_with(|| a.key.cmp(&b.key)));
  records
}

/// Fill in `increased` and `delta_pct` relative to `prior`.
pub fn diff(mut records: Vec<DatasetRecord>, prior: Option<&Snapshot>) -> Vec<DatasetRecord> {
  let Some(prior) = prior else {
    return records;
  };
  let prior: HashMap<_, _> = prior.records.iter().map(|r| (fold_key(&r.key), r)).collect();

  for record in &mut records {
    let Some(old) = prior.get(&fold_key(&record.key)) else {
      continue;
    };
    let (new, old) = (record.metric(), old.metric());
    if new == 0.0 {
      record.increased = new > 0.0;
      record.delta_pct = 0.0;
    } else {
      record.increased = new > old;
      record.delta_pct = 1.0 - old / new;
    }
  }
  records
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Mutex as StdMutex,
    atomic::{AtomicUsize, Ordering},
  };

  use chrono::TimeZone;

  use super::*;

  fn record(key: &str, rate: f64) -> DatasetRecord {
    DatasetRecord {
      key:              key.to_owned(),
      continent:        "Europe".to_owned(),
      year_week:        "2021-10".to_owned(),
      weekly_count:     0,
      cumulative_count: 0,
      rate_14_day:      rate,
      increased:        false,
      delta_pct:        0.0,
    }
  }

  fn snapshot(records: Vec<DatasetRecord>) -> Snapshot {
    Snapshot { records, collected_at: Utc::now() }
  }

  struct FakeSource {
    body:  StdMutex<String>,
    delay: StdMutex<Duration>,
    calls: AtomicUsize,
  }

  impl FakeSource {
    fn new(body: &str) -> Self {
      Self {
        body:  StdMutex::new(body.to_owned()),
        delay: StdMutex::new(Duration::ZERO),
        calls: AtomicUsize::new(0),
      }
    }

    fn set_body(&self, body: &str) { *self.body.lock().unwrap() = body.to_owned(); }

    fn set_delay(&self, delay: Duration) { *self.delay.lock().unwrap() = delay; }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl DatasetSource for Arc<FakeSource> {
    async fn fetch(&self) -> Result<String> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let delay = *self.delay.lock().unwrap();
      if !delay.is_zero() {
        tokio::time::sleep(delay).await;
      }
      Ok(self.body.lock().unwrap().clone())
    }
  }

  struct ManualClock(StdMutex<DateTime<Utc>>);

  impl ManualClock {
    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Arc<Self> {
      Arc::new(Self(StdMutex::new(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())))
    }

    fn set(&self, to: DateTime<Utc>) { *self.0.lock().unwrap() = to; }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> { *self.0.lock().unwrap() }
  }

  const BODY: &str = r#"[
    {"country": "Latvia",  "continent": "Europe",  "rate_14_day": "100"},
    {"country": "Estonia", "continent": "Europe",  "rate_14_day": "250.5"},
    {"country": "Chile",   "continent": "America", "rate_14_day": "900"}
  ]"#;

  // ─── Pipeline ──────────────────────────────────────────────────────────────

  #[test]
  fn normalize_filters_by_region_case_insensitively() {
    let mut asia = record("Japan", 1.0);
    asia.continent = "Asia".into();
    let mut shouting = record("Spain", 1.0);
    shouting.continent = "EUROPE".into();

    let kept = normalize(vec![record("Latvia", 1.0), asia, shouting], "europe");
    let keys: Vec<_> = kept.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, ["Latvia", "Spain"]);
  }

  #[test]
  fn dedupe_keeps_first_seen_record() {
    let out = dedupe(vec![record("Latvia", 10.0), record("Estonia", 5.0), record("LATVIA", 99.0)]);
    assert_eq!(out.len(), 2);
    let latvia = out.iter().find(|r| r.key.eq_ignore_ascii_case("latvia")).unwrap();
    assert_eq!(latvia.key, "Latvia");
    assert_eq!(latvia.rate_14_day, 10.0);
    // The later duplicate is dropped, not merged.
    assert!(out.iter().all(|r| r.rate_14_day != 99.0));
  }

  #[test]
  fn keys_fold_beyond_ascii() {
    let out = dedupe(vec![record("Türkiye", 100.0), record("TÜRKIYE", 999.0)]);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].key, "Türkiye");

    let prior = snapshot(out);
    let next = diff(vec![record("TÜRKIYE", 150.0)], Some(&prior));
    assert!(next[0].increased);
    assert!((next[0].delta_pct - 1.0 / 3.0).abs() < 1e-9);
  }

  #[test]
  fn rank_orders_by_metric_then_key() {
    let out = rank(vec![
      record("Bravo", 1.0),
      record("Alpha", 1.0),
      record("Zulu", 7.5),
      record("Mike", 0.0),
    ]);
    let keys: Vec<_> = out.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, ["Zulu", "Alpha", "Bravo", "Mike"]);
    assert!(out.windows(2).all(|w| w[0].metric() >= w[1].metric()));
  }

  #[test]
  fn diff_against_prior_snapshot() {
    let prior = snapshot(vec![record("Up", 100.0), record("Down", 100.0), record("Zero", 100.0)]);
    let out = diff(
      vec![record("Up", 150.0), record("Down", 50.0), record("Zero", 0.0), record("New", 10.0)],
      Some(&prior),
    );

    assert!(out[0].increased);
    assert!((out[0].delta_pct - 1.0 / 3.0).abs() < 1e-9);

    assert!(!out[1].increased);
    assert!((out[1].delta_pct + 1.0).abs() < 1e-9);

    assert!(!out[2].increased);
    assert_eq!(out[2].delta_pct, 0.0);

    assert!(!out[3].increased);
    assert_eq!(out[3].delta_pct, 0.0);
  }

  #[test]
  fn diff_without_prior_leaves_defaults() {
    let out = diff(vec![record("Solo", 3.0)], None);
    assert!(!out[0].increased);
    assert_eq!(out[0].delta_pct, 0.0);
  }

  #[test]
  fn max_age_policy() {
    let policy = Staleness::MaxAge(Duration::from_secs(3600));
    let at = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
    assert!(!policy.is_stale(at, at + chrono::Duration::minutes(59)));
    assert!(policy.is_stale(at, at + chrono::Duration::minutes(60)));
    assert!(!policy.is_stale(at, at - chrono::Duration::minutes(5)));
  }

  // ─── Refresh ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn refresh_builds_ranked_snapshot() {
    let source = Arc::new(FakeSource::new(BODY));
    let cache = DatasetCache::new(source.clone(), CacheConfig::default());
    assert!(cache.current_snapshot().is_none());
    assert!(cache.is_stale());

    let snap = cache.refresh(false).await.unwrap();
    let keys: Vec<_> = snap.records.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(keys, ["Estonia", "Latvia"]);
    assert!(Arc::ptr_eq(&snap, &cache.current_snapshot().unwrap()));
    assert!(!cache.is_stale());
  }

  #[tokio::test]
  async fn same_day_refreshes_fetch_once() {
    let source = Arc::new(FakeSource::new(BODY));
    let clock = ManualClock::at(2021, 3, 1, 8, 0);
    let cache = DatasetCache::with_clock(source.clone(), CacheConfig::default(), clock.clone());

    let first = cache.refresh(false).await.unwrap();
    clock.set(Utc.with_ymd_and_hms(2021, 3, 1, 23, 59, 59).unwrap());
    let second = cache.refresh(false).await.unwrap();
    assert_eq!(source.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));

    clock.set(Utc.with_ymd_and_hms(2021, 3, 2, 0, 0, 1).unwrap());
    assert!(cache.is_stale());
    cache.refresh(false).await.unwrap();
    assert_eq!(source.calls(), 2);
  }

  #[tokio::test]
  async fn forced_refresh_always_fetches_and_diffs() {
    let source = Arc::new(FakeSource::new(BODY));
    let cache = DatasetCache::new(source.clone(), CacheConfig::default());

    cache.refresh(false).await.unwrap();
    source.set_body(r#"[{"country": "Latvia", "continent": "Europe", "rate_14_day": "150"}]"#);
    let snap = cache.refresh(true).await.unwrap();

    assert_eq!(source.calls(), 2);
    let latvia = snap.get("latvia").unwrap();
    assert!(latvia.increased);
    assert!((latvia.delta_pct - 1.0 / 3.0).abs() < 1e-9);
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_refreshes_share_one_fetch() {
    let source = Arc::new(FakeSource::new(BODY));
    source.set_delay(Duration::from_millis(200));
    let cache = DatasetCache::new(source.clone(), CacheConfig::default());

    let (a, b) = tokio::join!(cache.refresh(true), cache.refresh(true));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(source.calls(), 1);
    assert!(Arc::ptr_eq(&a, &b));
  }

  #[tokio::test(start_paused = true)]
  async fn waiters_share_a_failed_fetch() {
    let source = Arc::new(FakeSource::new(BODY));
    source.set_delay(Duration::from_secs(3600));
    let config = CacheConfig { fetch_timeout: Duration::from_secs(60), ..CacheConfig::default() };
    let cache = DatasetCache::new(source.clone(), config);

    let started = tokio::time::Instant::now();
    let (a, b, c) = tokio::join!(cache.refresh(true), cache.refresh(false), cache.refresh(false));

    assert_eq!(source.calls(), 1);
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(60) && elapsed < Duration::from_secs(61), "{elapsed:?}");
    for result in [a, b, c] {
      let err = result.unwrap_err();
      assert!(matches!(&err, Error::Fetch(m) if m.contains("timed out")), "{err}");
    }
    assert!(cache.current_snapshot().is_none());

    // A later refresh that did not overlap the failure tries again.
    source.set_delay(Duration::ZERO);
    cache.refresh(false).await.unwrap();
    assert_eq!(source.calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn waiters_share_a_decode_failure() {
    let source = Arc::new(FakeSource::new(r#"[{"continent": "Europe"}]"#));
    source.set_delay(Duration::from_millis(200));
    let cache = DatasetCache::new(source.clone(), CacheConfig::default());

    let (a, b) = tokio::join!(cache.refresh(true), cache.refresh(true));
    assert_eq!(source.calls(), 1);
    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert!(matches!(&a, Error::Decode(e) if e.len() == 1), "{a}");
    assert_eq!(a.to_string(), b.to_string());
  }

  #[tokio::test(start_paused = true)]
  async fn timeout_keeps_prior_snapshot() {
    let source = Arc::new(FakeSource::new(BODY));
    let config = CacheConfig { fetch_timeout: Duration::from_secs(5), ..CacheConfig::default() };
    let cache = DatasetCache::new(source.clone(), config);
    let before = cache.refresh(false).await.unwrap();

    source.set_delay(Duration::from_secs(30));
    let err = cache.refresh(true).await.unwrap_err();
    assert!(matches!(err, Error::Fetch(_)), "{err}");
    assert_eq!(source.calls(), 2);

    assert!(Arc::ptr_eq(&before, &cache.current_snapshot().unwrap()));
  }

  #[tokio::test]
  async fn decode_failure_keeps_prior_snapshot() {
    let source = Arc::new(FakeSource::new(BODY));
    let cache = DatasetCache::new(source.clone(), CacheConfig::default());
    let before = cache.refresh(false).await.unwrap();

    source.set_body(r#"[{"continent": "Europe"}, {"country": 5}]"#);
    let err = cache.refresh(true).await.unwrap_err();
    assert!(matches!(&err, Error::Decode(e) if e.len() == 2), "{err}");

    assert!(Arc::ptr_eq(&before, &cache.current_snapshot().unwrap()));
  }
}
