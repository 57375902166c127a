//! SQLite backend for the Herald subscriber store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Opening a store runs the version guard
//! first: a file written by a different schema version is moved aside as a
//! `.backup` and replaced by a freshly bootstrapped one.

mod encode;
mod guard;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use guard::backup_path;
pub use schema::{SCHEMA_VERSION, Template};
pub use store::VersionedStore;
