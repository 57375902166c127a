//! Subscriber: one chat that has talked to the bot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Opaque chat identifier assigned by the chat platform.
pub type ChatId = i64;

/// Last known geolocation of a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Location {
  pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
      return Err(Error::InvalidLocation { latitude, longitude });
    }
    Ok(Self { latitude, longitude })
  }
}

/// A persisted subscriber record.
///
/// Exactly one record exists per [`ChatId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
  /// Store-assigned row id.
  pub id:            i64,
  pub chat_id:       ChatId,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub user_name:     Option<String>,
  pub registered_at: DateTime<Utc>,
  /// Receives the daily dataset broadcast.
  pub subscribed:    bool,
  pub admin:         bool,
  pub location:      Option<Location>,
}

impl Subscriber {
  /// Human-readable name for log lines and greetings.
  pub fn display_name(&self) -> String {
    match (&self.first_name, &self.last_name, &self.user_name) {
      (Some(first), Some(last), _) => format!("{first} {last}"),
      (Some(first), None, _) => first.clone(),
      (None, _, Some(user)) => format!("@{user}"),
      _ => self.chat_id.to_string(),
    }
  }
}

/// Input for creating a subscriber. The registration timestamp and row id are
/// assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewSubscriber {
  pub chat_id:    ChatId,
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  pub user_name:  Option<String>,
  pub subscribed: bool,
  pub admin:      bool,
  pub location:   Option<Location>,
}

impl NewSubscriber {
  /// A subscribed, non-admin user with no profile details.
  pub fn new(chat_id: ChatId) -> Self {
    Self { chat_id, subscribed: true, ..Default::default() }
  }
}
