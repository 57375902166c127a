//! Telegram Bot API binding: outbound [`Messenger`] and inbound long polling.

use std::{path::Path, sync::Arc, time::Duration};

use herald_core::{
  messenger::Messenger,
  store::SubscriberStore,
  subscriber::{ChatId, Location},
};
use herald_feed::{DatasetSource, JokeSource};
use reqwest::{
  Client,
  multipart::{Form, Part},
};
use serde::{Deserialize, de::DeserializeOwned};

use crate::{CommandHandler, Error, Incoming, Result, Sender};

/// How long a single `getUpdates` call may wait for new messages.
const POLL_TIMEOUT_SECS: u64 = 25;
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Async client for the Bot API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct TelegramClient {
  client: Client,
  base:   String,
}

impl TelegramClient {
  /// `timeout` bounds every request. It must exceed the long-poll window.
  pub fn new(token: &str, timeout: Duration) -> Result<Self> {
    Self::with_base_url(format!("https://api.telegram.org/bot{token}"), timeout)
  }

  pub fn with_base_url(base: impl Into<String>, timeout: Duration) -> Result<Self> {
    let timeout = timeout.max(Duration::from_secs(POLL_TIMEOUT_SECS + 5));
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base: base.into() })
  }

  fn url(&self, method: &str) -> String { format!("{}/{method}", self.base.trim_end_matches('/')) }

  async fn unwrap_response<T: DeserializeOwned>(
    method: &str,
    resp: reqwest::Response,
  ) -> Result<T> {
    let status = resp.status();
    let body: ApiResponse<T> = resp.json().await?;
    match (body.ok, body.result) {
      (true, Some(result)) => Ok(result),
      _ => Err(Error::Telegram(format!(
        "{method} → {status}: {}",
        body.description.unwrap_or_else(|| "no description".into())
      ))),
    }
  }

  /// `getMe`
  pub async fn get_me(&self) -> Result<User> {
    let resp = self.client.get(self.url("getMe")).send().await?;
    Self::unwrap_response("getMe", resp).await
  }

  /// `getUpdates` with long polling, starting at `offset`.
  pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
    let resp = self
      .client
      .get(self.url("getUpdates"))
      .query(&[
        ("offset", offset.to_string()),
        ("timeout", POLL_TIMEOUT_SECS.to_string()),
        ("allowed_updates", r#"["message","edited_message"]"#.to_string()),
      ])
      .send()
      .await?;
    Self::unwrap_response("getUpdates", resp).await
  }
}

impl Messenger for TelegramClient {
  type Error = Error;

  async fn send_text<'a>(&'a self, chat_id: ChatId, text: &'a str, silent: bool) -> Result<()> {
    let body = serde_json::json!({
      "chat_id": chat_id,
      "text": text,
      "parse_mode": "HTML",
      "disable_notification": silent,
    });
    let resp = self.client.post(self.url("sendMessage")).json(&body).send().await?;
    let _: serde_json::Value = Self::unwrap_response("sendMessage", resp).await?;
    Ok(())
  }

  async fn send_document<'a>(&'a self, chat_id: ChatId, path: &'a Path) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "file".into());

    let form = Form::new()
      .text("chat_id", chat_id.to_string())
      .part("document", Part::bytes(bytes).file_name(name));
    let resp = self.client.post(self.url("sendDocument")).multipart(form).send().await?;
    let _: serde_json::Value = Self::unwrap_response("sendDocument", resp).await?;
    Ok(())
  }
}

// ─── Polling ─────────────────────────────────────────────────────────────────

/// Poll for updates forever, handing each one to `handler` on its own task.
///
/// Transport errors are logged and retried after a short pause.
pub async fn run_polling<S, M, D, J>(
  client: TelegramClient,
  handler: Arc<CommandHandler<S, M, D, J>>,
) where
  S: SubscriberStore + 'static,
  M: Messenger + 'static,
  D: DatasetSource + 'static,
  J: JokeSource + 'static,
{
  let mut offset = 0;
  tracing::info!("polling for updates");
  loop {
    let updates = match client.get_updates(offset).await {
      Ok(updates) => updates,
      Err(e) => {
        tracing::warn!(error = %e, "getUpdates failed");
        tokio::time::sleep(RETRY_DELAY).await;
        continue;
      }
    };

    for update in updates {
      offset = offset.max(update.update_id + 1);
      let Some(incoming) = update.into_incoming() else {
        continue;
      };
      let handler = handler.clone();
      tokio::spawn(async move { handler.on_incoming(incoming).await });
    }
  }
}

// ─── API types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
  ok:          bool,
  result:      Option<T>,
  description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
  pub update_id:      i64,
  pub message:        Option<Message>,
  pub edited_message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
  pub message_id: i64,
  pub from:       Option<User>,
  pub chat:       Chat,
  pub text:       Option<String>,
  pub location:   Option<GeoPoint>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
  pub id:         i64,
  #[serde(default)]
  pub is_bot:     bool,
  pub first_name: String,
  pub last_name:  Option<String>,
  pub username:   Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
  pub id:         i64,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub username:   Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GeoPoint {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Update {
  /// The event the bot should react to, if any. Edited messages are treated
  /// like new ones; messages from bots are ignored.
  pub fn into_incoming(self) -> Option<Incoming> {
    let message = self.message.or(self.edited_message)?;
    if message.from.as_ref().is_some_and(|u| u.is_bot) {
      return None;
    }

    if let Some(point) = message.location {
      let location = Location::new(point.latitude, point.longitude).ok()?;
      return Some(Incoming::Location { chat_id: message.chat.id, location });
    }

    let text = message.text?;
    Some(Incoming::Text {
      sender: Sender {
        chat_id:    message.chat.id,
        first_name: message.chat.first_name,
        last_name:  message.chat.last_name,
        user_name:  message.chat.username,
      },
      text,
    })
  }
}
