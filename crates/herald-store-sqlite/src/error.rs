//! Error type for `herald-store-sqlite`.

use herald_core::{store::StoreError, subscriber::ChatId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The embedded template could not be applied to a new store file.
  #[error("bootstrap failed: {0}")]
  Bootstrap(String),

  /// The version record of an existing store is missing or unreadable.
  #[error("schema error: {0}")]
  Schema(String),

  #[error("chat {0} is already registered")]
  DuplicateKey(ChatId),

  #[error("core error: {0}")]
  Core(#[from] herald_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl StoreError for Error {
  fn is_duplicate_key(&self) -> bool { matches!(self, Self::DuplicateKey(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
