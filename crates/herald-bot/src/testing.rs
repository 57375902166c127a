//! Test doubles shared by the dispatcher and handler tests.

use std::{
  collections::HashSet,
  path::{Path, PathBuf},
  sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  },
  time::Duration,
};

use chrono::{DateTime, Utc};
use herald_core::{clock::Clock, messenger::Messenger, subscriber::ChatId};
use herald_feed::{CacheConfig, DatasetCache, DatasetSource, JokeSource};
use herald_store_sqlite::VersionedStore;

use crate::{CommandHandler, Error, NotificationDispatcher, Result, Sender, Uptime};

/// Three raw records, one of them a case-variant duplicate of the first.
pub const BODY_WITH_DUPLICATE: &str = r#"[
  {"country": "Latvia",  "continent": "Europe", "year_week": "2021-10", "rate_14_day": "100"},
  {"country": "Estonia", "continent": "Europe", "year_week": "2021-10", "rate_14_day": "250"},
  {"country": "LATVIA",  "continent": "Europe", "year_week": "2021-10", "rate_14_day": "999"}
]"#;

pub type TestDispatcher =
  NotificationDispatcher<VersionedStore, FakeMessenger, FakeSource, FakeJokes>;
pub type TestHandler = CommandHandler<VersionedStore, FakeMessenger, FakeSource, FakeJokes>;

pub fn sender(chat_id: ChatId) -> Sender {
  Sender {
    chat_id,
    first_name: Some("User".into()),
    last_name: Some(chat_id.to_string()),
    user_name: Some(format!("user{chat_id}")),
  }
}

/// Poll `done` until it holds, failing the test after a few seconds.
pub async fn wait_until(mut done: impl FnMut() -> bool) {
  tokio::time::timeout(Duration::from_secs(5), async {
    while !done() {
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  })
  .await
  .expect("condition not reached in time");
}

/// Wall time that starts at `base` and advances with the tokio clock.
pub struct TokioClock {
  base:  DateTime<Utc>,
  start: tokio::time::Instant,
}

impl TokioClock {
  pub fn starting_at(base: DateTime<Utc>) -> Arc<Self> {
    Arc::new(Self { base, start: tokio::time::Instant::now() })
  }
}

impl Clock for TokioClock {
  fn now(&self) -> DateTime<Utc> {
    self.base + chrono::Duration::from_std(self.start.elapsed()).unwrap()
  }
}

// ─── Messenger ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sent {
  pub chat_id: ChatId,
  pub text:    String,
  pub silent:  bool,
}

#[derive(Default)]
pub struct FakeMessenger {
  sent:      Mutex<Vec<Sent>>,
  documents: Mutex<Vec<(ChatId, PathBuf)>>,
  failing:   HashSet<ChatId>,
  in_flight: AtomicUsize,
  peak:      AtomicUsize,
}

impl FakeMessenger {
  pub fn failing_for(chats: &[ChatId]) -> Self {
    Self { failing: chats.iter().copied().collect(), ..Self::default() }
  }

  pub fn sent(&self) -> Vec<Sent> { self.sent.lock().unwrap().clone() }

  pub fn texts_to(&self, chat_id: ChatId) -> Vec<String> {
    self.sent().into_iter().filter(|m| m.chat_id == chat_id).map(|m| m.text).collect()
  }

  pub fn documents(&self) -> Vec<(ChatId, PathBuf)> { self.documents.lock().unwrap().clone() }

  pub fn peak_in_flight(&self) -> usize { self.peak.load(Ordering::SeqCst) }
}

impl Messenger for FakeMessenger {
  type Error = Error;

  async fn send_text<'a>(&'a self, chat_id: ChatId, text: &'a str, silent: bool) -> Result<()> {
    let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
    tokio::task::yield_now().await;
    self.in_flight.fetch_sub(1, Ordering::SeqCst);

    if self.failing.contains(&chat_id) {
      return Err(Error::Delivery(format!("chat {chat_id} blocked the bot")));
    }
    self.sent.lock().unwrap().push(Sent { chat_id, text: text.to_owned(), silent });
    Ok(())
  }

  async fn send_document<'a>(&'a self, chat_id: ChatId, path: &'a Path) -> Result<()> {
    self.documents.lock().unwrap().push((chat_id, path.to_path_buf()));
    Ok(())
  }
}

// ─── Feeds ───────────────────────────────────────────────────────────────────

pub struct FakeSource {
  body:  String,
  delay: Duration,
  calls: Arc<AtomicUsize>,
}

impl DatasetSource for FakeSource {
  async fn fetch(&self) -> herald_feed::Result<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      tokio::time::sleep(self.delay).await;
    }
    Ok(self.body.clone())
  }
}

#[derive(Default)]
pub struct FakeJokes {
  calls: AtomicUsize,
}

impl FakeJokes {
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

impl JokeSource for FakeJokes {
  async fn random_joke(&self) -> herald_feed::Result<String> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok("Tom & Jerry walk into a bar.".into())
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

pub struct Harness {
  pub store:      Arc<VersionedStore>,
  pub messenger:  Arc<FakeMessenger>,
  pub jokes:      Arc<FakeJokes>,
  pub dispatcher: Arc<TestDispatcher>,
  fetches:        Arc<AtomicUsize>,
}

impl Harness {
  pub fn fetches(&self) -> usize { self.fetches.load(Ordering::SeqCst) }
}

pub async fn harness(body: &str, failing: &[ChatId]) -> Harness {
  build(body, failing, 8, Duration::ZERO).await
}

pub async fn harness_with_fanout(body: &str, failing: &[ChatId], fanout: usize) -> Harness {
  build(body, failing, fanout, Duration::ZERO).await
}

/// Every dataset fetch takes `delay` before answering.
pub async fn harness_with_fetch_delay(body: &str, delay: Duration) -> Harness {
  build(body, &[], 8, delay).await
}

async fn build(body: &str, failing: &[ChatId], fanout: usize, delay: Duration) -> Harness {
  let store = Arc::new(VersionedStore::open_in_memory().await.unwrap());
  let messenger = Arc::new(FakeMessenger::failing_for(failing));
  let jokes = Arc::new(FakeJokes::default());
  let fetches = Arc::new(AtomicUsize::new(0));
  let source = FakeSource { body: body.to_owned(), delay, calls: fetches.clone() };
  let cache = Arc::new(DatasetCache::new(source, CacheConfig::default()));

  let dispatcher = Arc::new(NotificationDispatcher::new(
    store.clone(),
    messenger.clone(),
    cache,
    jokes.clone(),
    Uptime::start(),
    fanout,
  ));

  Harness { store, messenger, jokes, dispatcher, fetches }
}
