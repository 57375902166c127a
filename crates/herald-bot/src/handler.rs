//! Answers chat commands and other inbound messages.
//!
//! Every failure here is reported back to the chat that caused it and to
//! nobody else.

use std::{
  fs,
  io,
  path::{Path, PathBuf},
  sync::Arc,
  time::Instant,
};

use chrono::Utc;
use herald_core::{
  messenger::Messenger,
  store::{StoreError as _, SubscriberStore},
  subscriber::{ChatId, Location, NewSubscriber},
};
use herald_feed::{DatasetSource, JokeSource, render_report};
use rand::seq::SliceRandom as _;

use crate::{
  Error, Result,
  command::{Command, HELP, UNKNOWN},
  dispatcher::{NotificationDispatcher, format_joke},
  fuelcost::TripCost,
};

const PICTURE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Who sent an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
  pub chat_id:    ChatId,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub user_name:  Option<String>,
}

impl Sender {
  fn greeting(&self) -> String {
    let name = [self.first_name.as_deref(), self.last_name.as_deref()]
      .into_iter()
      .flatten()
      .collect::<Vec<_>>()
      .join(" ");
    match (&self.user_name, name.is_empty()) {
      (Some(user), true) => format!("Hi, @{}.", escape(user)),
      (Some(user), false) => format!("Hi, {} (user: '{}').", escape(&name), escape(user)),
      (None, false) => format!("Hi, {}.", escape(&name)),
      (None, true) => "Hi.".to_owned(),
    }
  }
}

/// An inbound chat event the bot reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
  Text { sender: Sender, text: String },
  Location { chat_id: ChatId, location: Location },
}

#[derive(Debug, Clone)]
pub struct CommandOptions {
  /// The very first user ever registered becomes an administrator.
  pub first_user_gets_admin: bool,
  /// Searched recursively by `/pic`.
  pub pics_dir:              PathBuf,
}

pub struct CommandHandler<S, M, D, J> {
  dispatcher: Arc<NotificationDispatcher<S, M, D, J>>,
  options:    CommandOptions,
}

impl<S, M, D, J> CommandHandler<S, M, D, J>
where
  S: SubscriberStore + 'static,
  M: Messenger + 'static,
  D: DatasetSource + 'static,
  J: JokeSource + 'static,
{
  pub fn new(dispatcher: Arc<NotificationDispatcher<S, M, D, J>>, options: CommandOptions) -> Self {
    Self { dispatcher, options }
  }

  pub async fn on_incoming(&self, incoming: Incoming) {
    match incoming {
      Incoming::Text { sender, text } => self.on_text(&sender, &text).await,
      Incoming::Location { chat_id, location } => {
        if let Err(e) = self.on_location(chat_id, location).await {
          tracing::warn!(chat_id, error = %e, "location update failed");
        }
      }
    }
  }

  /// Parse and run a command, replying with the error if it fails.
  pub async fn on_text(&self, sender: &Sender, text: &str) {
    let command = Command::parse(text);
    tracing::info!(
      chat_id = sender.chat_id,
      user = ?sender.user_name,
      ?command,
      "command received",
    );

    if let Err(e) = self.handle(sender, command).await {
      tracing::warn!(chat_id = sender.chat_id, error = %e, "command failed");
      if let Err(e) = self.reply(sender.chat_id, &escape(&format!("Error: {e}"))).await {
        tracing::warn!(chat_id = sender.chat_id, error = %e, "cannot report failure");
      }
    }
  }

  pub async fn handle(&self, sender: &Sender, command: Command) -> Result<()> {
    let chat_id = sender.chat_id;
    match command {
      Command::Start => self.start(sender).await,
      Command::Stop => self.stop(chat_id).await,
      Command::Help => self.reply(chat_id, &help_text()).await,
      Command::Uptime => self.reply(chat_id, &self.dispatcher.uptime().report()).await,
      Command::Date => {
        self.reply(chat_id, &Utc::now().format("%Y-%m-%d %H:%M:%SZ").to_string()).await
      }
      Command::Pic => self.send_picture(chat_id).await,
      Command::Corona { force } => self.corona(chat_id, force).await,
      Command::FuelCost { args } => {
        let trip = TripCost::from_args(&args)?;
        self.reply(chat_id, &trip.render()).await
      }
      Command::Joke => {
        let joke = self.dispatcher.jokes().random_joke().await?;
        self.reply(chat_id, &format_joke(&joke)).await
      }
      Command::Unknown(_) => self.reply(chat_id, UNKNOWN).await,
    }
  }

  /// Remember where the user is, if we know them.
  pub async fn on_location(&self, chat_id: ChatId, location: Location) -> Result<()> {
    let store = self.dispatcher.store();
    match store.get_user(chat_id).await.map_err(Error::store)? {
      Some(mut user) => {
        user.location = Some(location);
        store.update_user(&user).await.map_err(Error::store)?;
        tracing::debug!(chat_id, "location updated");
      }
      None => tracing::debug!(chat_id, "location from unknown chat ignored"),
    }
    Ok(())
  }

  async fn start(&self, sender: &Sender) -> Result<()> {
    let chat_id = sender.chat_id;
    self.reply(chat_id, &sender.greeting()).await?;

    let store = self.dispatcher.store();
    match store.get_user(chat_id).await.map_err(Error::store)? {
      None => {
        let first_ever = store.last_assigned_id().await.map_err(Error::store)?.is_none();
        let input = NewSubscriber {
          first_name: sender.first_name.clone(),
          last_name: sender.last_name.clone(),
          user_name: sender.user_name.clone(),
          admin: first_ever && self.options.first_user_gets_admin,
          ..NewSubscriber::new(chat_id)
        };
        match store.insert_user(input).await {
          Ok(user) => {
            tracing::info!(chat_id, admin = user.admin, "user added");
            self.reply(chat_id, "You have successfully subscribed").await?;
          }
          // A concurrent /start from the same chat registered it first.
          Err(e) if e.is_duplicate_key() => tracing::debug!(chat_id, "user already added"),
          Err(e) => return Err(Error::store(e)),
        }
      }
      Some(mut user) if !user.subscribed => {
        user.subscribed = true;
        store.update_user(&user).await.map_err(Error::store)?;
        tracing::info!(chat_id, "user resubscribed");
        self.reply(chat_id, "You have successfully subscribed").await?;
      }
      Some(_) => {}
    }

    self.reply(chat_id, &help_text()).await
  }

  async fn stop(&self, chat_id: ChatId) -> Result<()> {
    if self.dispatcher.store().delete_user(chat_id).await.map_err(Error::store)? {
      tracing::info!(chat_id, "user removed");
      self.reply(chat_id, "You have successfully unsubscribed").await
    } else {
      self.reply(chat_id, "You are not subscribed").await
    }
  }

  async fn corona(&self, chat_id: ChatId, force: bool) -> Result<()> {
    self.reply(chat_id, "Working on it…").await?;
    let started = Instant::now();
    let snapshot = self.dispatcher.cache().refresh(force).await?;
    self.reply(chat_id, &render_report(&snapshot, started.elapsed())).await
  }

  async fn send_picture(&self, chat_id: ChatId) -> Result<()> {
    let dir = self.options.pics_dir.clone();
    let pictures = tokio::task::spawn_blocking(move || find_pictures(&dir))
      .await
      .map_err(io::Error::other)??;

    let picture = pictures
      .choose(&mut rand::thread_rng())
      .cloned()
      .ok_or_else(|| Error::NoPictures(self.options.pics_dir.clone()))?;

    self
      .dispatcher
      .messenger()
      .send_document(chat_id, &picture)
      .await
      .map_err(|e| Error::Delivery(e.to_string()))?;
    tracing::info!(chat_id, file = %picture.display(), "picture sent");
    Ok(())
  }

  async fn reply(&self, chat_id: ChatId, text: &str) -> Result<()> {
    self
      .dispatcher
      .messenger()
      .send_text(chat_id, text, false)
      .await
      .map_err(|e| Error::Delivery(e.to_string()))
  }
}

fn help_text() -> String { format!("Herald v{}\n{HELP}", env!("CARGO_PKG_VERSION")) }

fn escape(s: &str) -> String {
  s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Image files under `dir`, recursively. A missing directory has none.
fn find_pictures(dir: &Path) -> io::Result<Vec<PathBuf>> {
  let mut found = Vec::new();
  let mut pending = vec![dir.to_path_buf()];

  while let Some(dir) = pending.pop() {
    let entries = match fs::read_dir(&dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
      Err(e) => return Err(e),
    };
    for entry in entries {
      let path = entry?.path();
      if path.is_dir() {
        pending.push(path);
      } else if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| PICTURE_EXTENSIONS.iter().any(|p| e.eq_ignore_ascii_case(p)))
      {
        found.push(path);
      }
    }
  }

  found.sort();
  Ok(found)
}
