//! The `SubscriberStore` trait.
//!
//! Implemented by storage backends (e.g. `herald-store-sqlite`). The bot
//! depends on this abstraction, not on any concrete backend.

use std::future::Future;

use crate::subscriber::{ChatId, NewSubscriber, Subscriber};

/// Backend failures that callers tell apart.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// An insert hit a chat id that is already registered.
  fn is_duplicate_key(&self) -> bool;
}

/// Typed queries over the subscriber table. No business logic lives here.
///
/// Update and delete have at-most-one-effect semantics: targeting an unknown
/// chat id is a no-op, not an error, so callers can retry freely.
pub trait SubscriberStore: Send + Sync {
  type Error: StoreError;

  fn list_users(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;

  /// Users that receive the daily broadcast.
  fn list_subscribed(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;

  fn list_admins(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscriber>, Self::Error>> + Send + '_;

  /// Retrieve a user by chat id. Returns `None` if not found.
  fn get_user(
    &self,
    chat_id: ChatId,
  ) -> impl Future<Output = Result<Option<Subscriber>, Self::Error>> + Send + '_;

  fn count_users(&self) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Persist a new user. Fails if the chat id already exists.
  fn insert_user(
    &self,
    input: NewSubscriber,
  ) -> impl Future<Output = Result<Subscriber, Self::Error>> + Send + '_;

  /// Overwrite the mutable fields of an existing user, keyed by chat id.
  /// Returns `false` when no such user exists.
  fn update_user<'a>(
    &'a self,
    user: &'a Subscriber,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Returns `false` when no such user exists.
  fn delete_user(
    &self,
    chat_id: ChatId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Highest row id ever assigned, or `None` if no user was ever inserted.
  fn last_assigned_id(
    &self,
  ) -> impl Future<Output = Result<Option<i64>, Self::Error>> + Send + '_;

  /// Reclaim unused space. Never runs concurrently with schema recreation.
  fn compact(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
