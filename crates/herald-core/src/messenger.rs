//! The outbound chat transport.

use std::{future::Future, path::Path};

use crate::subscriber::ChatId;

/// Sends messages to a chat. Implemented by the Telegram binding and by test
/// doubles.
pub trait Messenger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Send an HTML-formatted text message. `silent` suppresses the
  /// notification sound on the recipient's device.
  fn send_text<'a>(
    &'a self,
    chat_id: ChatId,
    text: &'a str,
    silent: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Upload a local file as a document.
  fn send_document<'a>(
    &'a self,
    chat_id: ChatId,
    path: &'a Path,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
