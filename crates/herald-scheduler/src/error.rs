//! Error type for `herald-scheduler`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid trigger time {0:?}: expected HH:MM:SS")]
  InvalidTime(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
