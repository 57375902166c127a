//! Error types for `herald-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown action: {0:?}")]
  UnknownAction(String),

  #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
  InvalidLocation { latitude: f64, longitude: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
