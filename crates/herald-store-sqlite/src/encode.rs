//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings; flags as 0/1 integers.

use chrono::{DateTime, Utc};
use herald_core::subscriber::{Location, Subscriber};

use crate::{Error, Result};

pub const USER_COLUMNS: &str = "id, chat_id, first_name, last_name, user_name, registered_at, \
                                subscribed, admin, location_latitude, location_longitude";

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// A `users` row exactly as read from SQLite.
pub struct RawSubscriber {
  pub id:            i64,
  pub chat_id:       i64,
  pub first_name:    Option<String>,
  pub last_name:     Option<String>,
  pub user_name:     Option<String>,
  pub registered_at: String,
  pub subscribed:    bool,
  pub admin:         bool,
  pub latitude:      Option<f64>,
  pub longitude:     Option<f64>,
}

impl RawSubscriber {
  /// Map a row selected with [`USER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      chat_id:       row.get(1)?,
      first_name:    row.get(2)?,
      last_name:     row.get(3)?,
      user_name:     row.get(4)?,
      registered_at: row.get(5)?,
      subscribed:    row.get(6)?,
      admin:         row.get(7)?,
      latitude:      row.get(8)?,
      longitude:     row.get(9)?,
    })
  }

  pub fn into_subscriber(self) -> Result<Subscriber> {
    // A half-written location is treated as unknown.
    let location = match (self.latitude, self.longitude) {
      (Some(lat), Some(lon)) => Some(Location::new(lat, lon)?),
      _ => None,
    };
    Ok(Subscriber {
      id: self.id,
      chat_id: self.chat_id,
      first_name: self.first_name,
      last_name: self.last_name,
      user_name: self.user_name,
      registered_at: decode_dt(&self.registered_at)?,
      subscribed: self.subscribed,
      admin: self.admin,
      location,
    })
  }
}
