//! Embedded schema and seed scripts for the Herald store.

use std::borrow::Cow;

/// Version written to the `DB_VERSION` setting of every store this build
/// creates. Any other stored value makes the version guard recreate the file.
pub const SCHEMA_VERSION: i64 = 6;

/// Table definitions; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Single statement writing the version record. Binds `:version`.
const SEED: &str = include_str!("../sql/seed.sql");

/// Everything needed to turn an empty file into a valid store.
#[derive(Debug, Clone)]
pub struct Template {
  pub version: i64,
  pub schema:  Cow<'static, str>,
  pub seed:    Cow<'static, str>,
}

impl Template {
  /// The template compiled into this binary.
  pub fn embedded() -> Self {
    Self {
      version: SCHEMA_VERSION,
      schema:  Cow::Borrowed(SCHEMA),
      seed:    Cow::Borrowed(SEED),
    }
  }
}

impl Default for Template {
  fn default() -> Self { Self::embedded() }
}
