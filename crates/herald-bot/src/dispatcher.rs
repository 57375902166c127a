//! Scheduled actions and bounded fan-out to chat recipients.

use std::{sync::Arc, time::Instant};

use herald_core::{
  action::Action, messenger::Messenger, store::SubscriberStore, subscriber::ChatId,
};
use herald_feed::{DatasetCache, DatasetSource, JokeSource, render_report};
use herald_scheduler::ActionHandler;
use tokio::{sync::Semaphore, task::JoinSet};

use crate::uptime::Uptime;

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
  pub delivered: usize,
  pub failed:    usize,
}

impl FanoutSummary {
  pub fn total(&self) -> usize { self.delivered + self.failed }
}

/// Runs actions and delivers their messages.
///
/// Every recipient is served by its own task; at most `fanout_concurrency`
/// sends are in flight at once. One recipient failing never affects the
/// others.
pub struct NotificationDispatcher<S, M, D, J> {
  store:     Arc<S>,
  messenger: Arc<M>,
  cache:     Arc<DatasetCache<D>>,
  jokes:     Arc<J>,
  uptime:    Uptime,
  fanout:    Arc<Semaphore>,
}

impl<S, M, D, J> NotificationDispatcher<S, M, D, J>
where
  S: SubscriberStore + 'static,
  M: Messenger + 'static,
  D: DatasetSource + 'static,
  J: JokeSource + 'static,
{
  pub fn new(
    store: Arc<S>,
    messenger: Arc<M>,
    cache: Arc<DatasetCache<D>>,
    jokes: Arc<J>,
    uptime: Uptime,
    fanout_concurrency: usize,
  ) -> Self {
    Self {
      store,
      messenger,
      cache,
      jokes,
      uptime,
      fanout: Arc::new(Semaphore::new(fanout_concurrency.max(1))),
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn messenger(&self) -> &M { &self.messenger }

  pub fn cache(&self) -> &DatasetCache<D> { &self.cache }

  pub fn jokes(&self) -> &J { &self.jokes }

  pub fn uptime(&self) -> &Uptime { &self.uptime }

  /// Run `action` to completion.
  pub async fn fire(&self, action: Action) -> FanoutSummary {
    tracing::debug!(%action, "dispatching");
    let summary = match action {
      Action::DatasetBroadcast => self.broadcast_dataset().await,
      Action::Maintenance => self.run_maintenance().await,
      Action::Joke => self.broadcast_joke().await,
    };
    tracing::info!(
      %action,
      delivered = summary.delivered,
      failed = summary.failed,
      "action finished",
    );
    summary
  }

  /// Refresh the dataset once and send the same report to every subscriber.
  pub async fn broadcast_dataset(&self) -> FanoutSummary {
    let Some(audience) = self.audience(self.store.list_subscribed().await) else {
      return FanoutSummary::default();
    };

    let started = Instant::now();
    let snapshot = match self.cache.refresh(true).await {
      Ok(snapshot) => snapshot,
      Err(e) => {
        tracing::warn!(error = %e, "dataset refresh failed; broadcast skipped");
        return FanoutSummary::default();
      }
    };

    let report = render_report(&snapshot, started.elapsed());
    self.fan_out(audience, report, false).await
  }

  /// Compact the store, then tell administrators how long we have been up.
  pub async fn run_maintenance(&self) -> FanoutSummary {
    tracing::info!("compacting store");
    if let Err(e) = self.store.compact().await {
      tracing::warn!(error = %e, "store compaction failed");
    }
    self.notify_admins(&self.uptime.report(), true).await
  }

  pub async fn broadcast_joke(&self) -> FanoutSummary {
    let Some(audience) = self.audience(self.store.list_subscribed().await) else {
      return FanoutSummary::default();
    };

    match self.jokes.random_joke().await {
      Ok(joke) => self.fan_out(audience, format_joke(&joke), false).await,
      Err(e) => {
        tracing::warn!(error = %e, "joke fetch failed; broadcast skipped");
        FanoutSummary::default()
      }
    }
  }

  pub async fn notify_admins(&self, text: &str, silent: bool) -> FanoutSummary {
    match self.audience(self.store.list_admins().await) {
      Some(admins) => self.fan_out(admins, text.to_owned(), silent).await,
      None => FanoutSummary::default(),
    }
  }

  fn audience(
    &self,
    users: Result<Vec<herald_core::subscriber::Subscriber>, S::Error>,
  ) -> Option<Vec<ChatId>> {
    match users {
      Ok(users) if users.is_empty() => {
        tracing::info!("no users to notify");
        None
      }
      Ok(users) => Some(users.into_iter().map(|u| u.chat_id).collect()),
      Err(e) => {
        tracing::warn!(error = %e, "cannot list recipients");
        None
      }
    }
  }

  /// Send `text` to every chat in `recipients` and wait for all of them.
  pub async fn fan_out(
    &self,
    recipients: Vec<ChatId>,
    text: String,
    silent: bool,
  ) -> FanoutSummary {
    tracing::info!(recipients = recipients.len(), "sending notifications");
    let text: Arc<str> = text.into();
    let mut tasks = JoinSet::new();

    for chat_id in recipients {
      let messenger = self.messenger.clone();
      let fanout = self.fanout.clone();
      let text = text.clone();
      tasks.spawn(async move {
        let outcome = match fanout.acquire_owned().await {
          Ok(_permit) => messenger
            .send_text(chat_id, &text, silent)
            .await
            .map_err(|e| e.to_string()),
          Err(e) => Err(e.to_string()),
        };
        (chat_id, outcome)
      });
    }

    let mut summary = FanoutSummary::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((chat_id, Ok(()))) => {
          summary.delivered += 1;
          tracing::info!(chat_id, "delivered");
        }
        Ok((chat_id, Err(error))) => {
          summary.failed += 1;
          tracing::warn!(chat_id, %error, "delivery failed");
        }
        Err(e) => {
          summary.failed += 1;
          tracing::error!(error = %e, "delivery task aborted");
        }
      }
    }
    summary
  }
}

impl<S, M, D, J> ActionHandler for NotificationDispatcher<S, M, D, J>
where
  S: SubscriberStore + 'static,
  M: Messenger + 'static,
  D: DatasetSource + 'static,
  J: JokeSource + 'static,
{
  async fn fire(&self, action: Action) { NotificationDispatcher::fire(self, action).await; }
}

pub fn format_joke(joke: &str) -> String {
  format!(
    "<b>Random joke</b>\n{}",
    joke.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
  )
}
