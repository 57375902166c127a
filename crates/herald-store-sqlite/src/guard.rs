//! Version guard: validates a store file before it is handed out, and
//! replaces it when it was written by a different schema version.
//!
//! Everything here is synchronous and runs before the long-lived
//! [`tokio_rusqlite::Connection`] is opened, so no caller can hold a handle to
//! a file that is about to be moved.

use std::{
  ffi::OsString,
  fs,
  path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};

use crate::{Error, Result, schema::Template};

/// What the guard did to the file at the requested path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
  /// No file existed; a new store was bootstrapped.
  Created,
  /// The file existed and carried the expected version.
  Valid,
  /// The file carried `old_version`; it was moved to `backup` and a new
  /// store was bootstrapped in its place.
  Recreated { old_version: i64, backup: PathBuf },
}

/// Name of the backup file for a store at `path` holding `old_version`:
/// `<path>_V<old_version>_<yyyyMMddHHmmssSSS>.backup` (UTC).
pub fn backup_path(path: &Path, old_version: i64, at: DateTime<Utc>) -> PathBuf {
  let mut name = OsString::from(path.as_os_str());
  name.push(format!(
    "_V{old_version}_{}.backup",
    at.format("%Y%m%d%H%M%S%3f")
  ));
  PathBuf::from(name)
}

/// Make sure `path` holds a store at `template.version`.
pub fn ensure(path: &Path, template: &Template, now: DateTime<Utc>) -> Result<GuardOutcome> {
  if !path.exists() {
    bootstrap(path, template)?;
    return Ok(GuardOutcome::Created);
  }

  let old_version = {
    let conn = rusqlite::Connection::open(path)
      .map_err(|e| Error::Schema(format!("cannot open {}: {e}", path.display())))?;
    let version = read_version(&conn)?;
    conn
      .close()
      .map_err(|(_, e)| Error::Schema(format!("cannot close {}: {e}", path.display())))?;
    version
  };

  if old_version == template.version {
    return Ok(GuardOutcome::Valid);
  }

  // Two recreations within the same millisecond share a name; the later
  // backup replaces the earlier one.
  let backup = backup_path(path, old_version, now);
  if backup.exists() {
    fs::remove_file(&backup)?;
  }
  fs::rename(path, &backup)?;

  bootstrap(path, template)?;
  Ok(GuardOutcome::Recreated { old_version, backup })
}

/// Create a new store file at `path` from `template`.
///
/// A partially written file is removed again on failure so the next start
/// retries the bootstrap instead of tripping over a store without a version.
pub fn bootstrap(path: &Path, template: &Template) -> Result<()> {
  if template.schema.trim().is_empty() || template.seed.trim().is_empty() {
    return Err(Error::Bootstrap("embedded store template is empty".into()));
  }

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| {
      Error::Bootstrap(format!("cannot create {}: {e}", parent.display()))
    })?;
  }

  let result = rusqlite::Connection::open(path)
    .map_err(|e| Error::Bootstrap(format!("cannot create {}: {e}", path.display())))
    .and_then(|conn| apply(&conn, template));

  if result.is_err() {
    let _ = fs::remove_file(path);
  }
  result
}

/// Run the schema and seed scripts of `template` against `conn`.
pub fn apply(conn: &rusqlite::Connection, template: &Template) -> Result<()> {
  conn
    .execute_batch(&template.schema)
    .map_err(|e| Error::Bootstrap(format!("schema script failed: {e}")))?;
  conn
    .execute(
      &template.seed,
      rusqlite::named_params! { ":version": template.version.to_string() },
    )
    .map_err(|e| Error::Bootstrap(format!("seed script failed: {e}")))?;
  Ok(())
}

/// Read the `DB_VERSION` setting. Absent or non-integer values are fatal.
pub fn read_version(conn: &rusqlite::Connection) -> Result<i64> {
  let value: Option<Value> = conn
    .query_row(
      "SELECT value FROM settings WHERE key = 'DB_VERSION'",
      [],
      |row| row.get(0),
    )
    .optional()
    .map_err(|e| Error::Schema(format!("cannot read settings: {e}")))?;

  match value {
    None => Err(Error::Schema("DB_VERSION record is missing".into())),
    Some(Value::Integer(v)) => Ok(v),
    Some(Value::Text(s)) => s
      .trim()
      .parse()
      .map_err(|_| Error::Schema(format!("DB_VERSION {s:?} is not an integer"))),
    Some(other) => Err(Error::Schema(format!(
      "DB_VERSION has unexpected type {:?}",
      other.data_type()
    ))),
  }
}
