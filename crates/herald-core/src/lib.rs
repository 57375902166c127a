//! Core types and trait definitions for the Herald notification bot.
//!
//! No HTTP or database code lives here; the store, feed, scheduler and bot
//! crates all build on these types.

// Implementations write plain `async fn`; the traits spell out `+ Send`.
#![allow(async_fn_in_trait)]

pub mod action;
pub mod clock;
pub mod dataset;
pub mod error;
pub mod messenger;
pub mod store;
pub mod subscriber;

pub use error::{Error, Result};
