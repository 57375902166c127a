//! [`VersionedStore`]: the SQLite implementation of [`SubscriberStore`].

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::OptionalExtension as _;

use herald_core::{
  store::SubscriberStore,
  subscriber::{ChatId, NewSubscriber, Subscriber},
};

use crate::{
  Error, Result,
  encode::{RawSubscriber, USER_COLUMNS, encode_dt},
  guard::{self, GuardOutcome},
  schema::Template,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Herald subscriber store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All clones
/// share one connection thread, which serializes writers.
#[derive(Clone)]
pub struct VersionedStore {
  conn: tokio_rusqlite::Connection,
  path: Option<PathBuf>,
}

impl VersionedStore {
  /// Open (or create) the store at `path` with the embedded template.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_template(path, Template::embedded()).await
  }

  /// Open (or create) the store at `path`, validating it against
  /// `template.version` and recreating it from `template` on mismatch.
  pub async fn open_with_template(path: impl AsRef<Path>, template: Template) -> Result<Self> {
    let path = path.as_ref().to_path_buf();

    let guard_path = path.clone();
    let outcome =
      tokio::task::spawn_blocking(move || guard::ensure(&guard_path, &template, Utc::now()))
        .await
        .map_err(|e| Error::Bootstrap(format!("version guard task failed: {e}")))??;

    match &outcome {
      GuardOutcome::Created => {
        tracing::info!(path = %path.display(), "created new store");
      }
      GuardOutcome::Valid => {
        tracing::debug!(path = %path.display(), "store version ok");
      }
      GuardOutcome::Recreated { old_version, backup } => {
        tracing::warn!(
          path = %path.display(),
          old_version,
          backup = %backup.display(),
          "store version mismatch; previous store backed up and recreated",
        );
      }
    }

    let conn = tokio_rusqlite::Connection::open(&path).await?;
    Ok(Self { conn, path: Some(path) })
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let template = Template::embedded();
    conn
      .call(move |conn| Ok(guard::apply(conn, &template)))
      .await??;
    Ok(Self { conn, path: None })
  }

  /// Backing file, or `None` for in-memory stores.
  pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

  /// The `DB_VERSION` recorded in the store.
  pub async fn schema_version(&self) -> Result<i64> {
    self
      .conn
      .call(|conn| Ok(guard::read_version(conn)))
      .await?
  }

  /// Close the connection, waiting for queued calls to finish.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  /// Run a `SELECT <USER_COLUMNS> FROM users <clause>` query.
  ///
  /// `clause` is always a static string; values are never spliced in.
  async fn select_users(&self, clause: &'static str) -> Result<Vec<Subscriber>> {
    let raws: Vec<RawSubscriber> = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users {clause} ORDER BY id"))?;
        let rows = stmt
          .query_map([], RawSubscriber::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubscriber::into_subscriber).collect()
  }
}

// ─── SubscriberStore impl ────────────────────────────────────────────────────

impl SubscriberStore for VersionedStore {
  type Error = Error;

  async fn list_users(&self) -> Result<Vec<Subscriber>> { self.select_users("").await }

  async fn list_subscribed(&self) -> Result<Vec<Subscriber>> {
    self.select_users("WHERE subscribed = 1").await
  }

  async fn list_admins(&self) -> Result<Vec<Subscriber>> {
    self.select_users("WHERE admin = 1").await
  }

  async fn get_user(&self, chat_id: ChatId) -> Result<Option<Subscriber>> {
    let raw: Option<RawSubscriber> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {USER_COLUMNS} FROM users WHERE chat_id = ?1"),
              rusqlite::params![chat_id],
              RawSubscriber::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubscriber::into_subscriber).transpose()
  }

  async fn count_users(&self) -> Result<u64> {
    let count: i64 = self
      .conn
      .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
      .await?;
    Ok(count.max(0) as u64)
  }

  async fn insert_user(&self, input: NewSubscriber) -> Result<Subscriber> {
    let registered_at = Utc::now();
    let at_str        = encode_dt(registered_at);
    let row           = input.clone();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO users (
             chat_id, first_name, last_name, user_name, registered_at,
             subscribed, admin, location_latitude, location_longitude
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            row.chat_id,
            row.first_name,
            row.last_name,
            row.user_name,
            at_str,
            row.subscribed,
            row.admin,
            row.location.map(|l| l.latitude),
            row.location.map(|l| l.longitude),
          ],
        );
        match res {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
          {
            Ok(None)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    let id = id.ok_or(Error::DuplicateKey(input.chat_id))?;

    Ok(Subscriber {
      id,
      chat_id: input.chat_id,
      first_name: input.first_name,
      last_name: input.last_name,
      user_name: input.user_name,
      registered_at,
      subscribed: input.subscribed,
      admin: input.admin,
      location: input.location,
    })
  }

  async fn update_user<'a>(&'a self, user: &'a Subscriber) -> Result<bool> {
    let row = user.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE users
           SET first_name = ?2, last_name = ?3, user_name = ?4,
               subscribed = ?5, admin = ?6,
               location_latitude = ?7, location_longitude = ?8
           WHERE chat_id = ?1",
          rusqlite::params![
            row.chat_id,
            row.first_name,
            row.last_name,
            row.user_name,
            row.subscribed,
            row.admin,
            row.location.map(|l| l.latitude),
            row.location.map(|l| l.longitude),
          ],
        )?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn delete_user(&self, chat_id: ChatId) -> Result<bool> {
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM users WHERE chat_id = ?1",
          rusqlite::params![chat_id],
        )?)
      })
      .await?;

    Ok(removed > 0)
  }

  async fn last_assigned_id(&self) -> Result<Option<i64>> {
    let seq = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT seq FROM sqlite_sequence WHERE name = 'users'",
              [],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    Ok(seq)
  }

  /// `VACUUM main`. Schema recreation only happens inside
  /// [`VersionedStore::open`], before any handle exists, so this can never
  /// overlap it.
  async fn compact(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("VACUUM main;")?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
