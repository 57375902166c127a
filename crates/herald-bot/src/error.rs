//! Error type for `herald-bot`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed command arguments; reported back to the sender only.
  #[error("invalid argument: {0}")]
  Argument(String),

  #[error("delivery failed: {0}")]
  Delivery(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error(transparent)]
  Feed(#[from] herald_feed::Error),

  #[error("'{}' has no images", .0.display())]
  NoPictures(PathBuf),

  #[error("telegram api error: {0}")]
  Telegram(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
