//! The Herald notification bot.
//!
//! Wires the subscriber store, the dataset cache and the trigger scheduler
//! to a chat transport. [`NotificationDispatcher`] runs scheduled actions,
//! [`CommandHandler`] answers chat commands, and [`telegram`] binds both to
//! the Telegram Bot API.

pub mod command;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fuelcost;
pub mod handler;
pub mod telegram;
pub mod uptime;

#[cfg(test)]
mod testing;

pub use command::Command;
pub use config::BotConfig;
pub use dispatcher::{FanoutSummary, NotificationDispatcher};
pub use error::{Error, Result};
pub use handler::{CommandHandler, CommandOptions, Incoming, Sender};
pub use telegram::TelegramClient;
pub use uptime::Uptime;
