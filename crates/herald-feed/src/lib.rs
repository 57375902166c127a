//! Remote data feeds for the Herald bot.
//!
//! [`DatasetCache`] holds the latest snapshot of the remote dataset and
//! guarantees that concurrent refreshes collapse into a single fetch.
//! [`JokeSource`] implementations fetch one-off jokes; they are never cached.

mod decode;

pub mod cache;
pub mod error;
pub mod joke;
pub mod report;
pub mod source;

pub use cache::{CacheConfig, DatasetCache, Staleness};
pub use error::{Error, FieldError, Result};
pub use joke::{HttpJokeSource, JokeSource};
pub use report::render_report;
pub use source::{DatasetSource, HttpDatasetSource};
