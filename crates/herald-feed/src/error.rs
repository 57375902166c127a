//! Error types for `herald-feed`.

use std::fmt;

use thiserror::Error;

/// One field that could not be decoded from the dataset payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  /// Position of the offending record, or `None` for document-level errors.
  pub record:  Option<usize>,
  pub field:   String,
  pub message: String,
}

impl FieldError {
  pub(crate) fn at(record: usize, field: &str, message: impl Into<String>) -> Self {
    Self { record: Some(record), field: field.to_owned(), message: message.into() }
  }

  pub(crate) fn document(message: impl Into<String>) -> Self {
    Self { record: None, field: "$".to_owned(), message: message.into() }
  }
}

impl fmt::Display for FieldError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.record {
      Some(i) => write!(f, "record {i}, field `{}`: {}", self.field, self.message),
      None => write!(f, "document: {}", self.message),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// Transport failure, timeout or a non-success status.
  #[error("fetch failed: {0}")]
  Fetch(String),

  /// Every field-level problem found in the payload.
  #[error("decode failed with {} error(s): {}", .0.len(), join(.0))]
  Decode(Vec<FieldError>),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("xml error: {0}")]
  Xml(#[from] quick_xml::DeError),
}

impl Error {
  /// The same failure for a caller that waited on the refresh which hit it.
  /// Transport errors are not `Clone` and carry over as text.
  pub(crate) fn replay(&self) -> Self {
    match self {
      Self::Fetch(message) => Self::Fetch(message.clone()),
      Self::Decode(errors) => Self::Decode(errors.clone()),
      other => Self::Fetch(other.to_string()),
    }
  }
}

fn join(errors: &[FieldError]) -> String {
  errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
