//! Export-based encryption: attach a keyed target, copy with `sqlcipher_export`, detach

use crate::Result;
use crate::database::{SqliteDatabase, classify, keyed_options};
use crate::error::Error;
use sqlx::{ConnectOptions, Connection};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Files SQLite keeps next to the main database file.
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Outcome of a verified [`export_encrypted`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
   /// Number of schema objects (tables, indexes, views, triggers) found in the exported file
   pub schema_objects: i64,
}

/// Validates that a schema name is a valid SQLite identifier
///
/// A valid schema name is non-empty, contains only ASCII alphanumeric characters
/// and underscores, and does not start with a digit. Schema names are formatted
/// into ATTACH/DETACH statements, so nothing else is accepted.
pub fn is_valid_schema_name(name: &str) -> bool {
   name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
      && name.chars().next().is_some_and(|c| !c.is_ascii_digit())
}

/// Single-quoted SQL string literal.
pub(crate) fn quote_literal(value: &str) -> String {
   format!("'{}'", value.replace('\'', "''"))
}

/// Copy every object of `db` into the file at `target`, encrypted with `key`
///
/// Runs on the database's writer:
/// 1. `ATTACH DATABASE target AS schema_name KEY key`
/// 2. `SELECT sqlcipher_export(schema_name)`
/// 3. `DETACH DATABASE schema_name`
///
/// DETACH is attempted even when the export fails so the writer goes back to the
/// pool clean. The target is then reopened with `key` and its schema object count
/// compared to the source; a mismatch is [`Error::ExportVerificationFailed`].
///
/// `target` should be an empty file. Nothing about `db`'s own file changes.
///
/// # Errors
///
/// Returns an error if:
/// - The schema name is not a plain identifier
/// - The database is closed or read-only
/// - Any of the three statements fails
/// - The exported file cannot be read back with `key`
pub async fn export_encrypted(
   db: &SqliteDatabase,
   target: &Path,
   key: &str,
   schema_name: &str,
) -> Result<ExportReport> {
   if !is_valid_schema_name(schema_name) {
      return Err(Error::InvalidSchemaName(schema_name.to_string()));
   }

   let mut writer = db.acquire_writer().await?;

   let (expected,): (i64,) = sqlx::query_as("SELECT count(*) FROM main.sqlite_master")
      .fetch_one(&mut *writer)
      .await?;

   // Schema name is validated above; path and key are bound
   let attach_sql = format!("ATTACH DATABASE ?1 AS {} KEY ?2", schema_name);
   sqlx::query(&attach_sql)
      .bind(target.to_string_lossy().into_owned())
      .bind(key)
      .execute(&mut *writer)
      .await?;

   debug!("Exporting {} into {}", db.path().display(), target.display());

   let exported = sqlx::query("SELECT sqlcipher_export(?1)")
      .bind(schema_name)
      .execute(&mut *writer)
      .await;

   let detach_sql = format!("DETACH DATABASE {}", schema_name);
   let detached = sqlx::query(&detach_sql).execute(&mut *writer).await;

   if let Err(e) = &detached {
      warn!("Failed to detach {}: {}", schema_name, e);
   }

   exported?;
   detached?;
   drop(writer);

   let found = count_schema_objects(target, key).await?;
   if found != expected {
      return Err(Error::ExportVerificationFailed { expected, found });
   }

   Ok(ExportReport {
      schema_objects: found,
   })
}

/// Open `path` read-only with `key` on a standalone connection and count its schema objects.
async fn count_schema_objects(path: &Path, key: &str) -> Result<i64> {
   let mut conn = keyed_options(path, Some(key))
      .read_only(true)
      .connect()
      .await
      .map_err(|e| classify(e, path))?;

   let counted: std::result::Result<(i64,), sqlx::Error> =
      sqlx::query_as("SELECT count(*) FROM sqlite_master")
         .fetch_one(&mut conn)
         .await;

   conn.close().await?;

   counted.map(|(count,)| count).map_err(|e| classify(e, path))
}

/// Delete the `-wal`, `-shm` and `-journal` files belonging to `path`
///
/// Missing files are ignored; any other IO error is returned.
pub fn remove_sidecars(path: &Path) -> Result<()> {
   for suffix in SIDECAR_SUFFIXES {
      let sidecar = sidecar_path(path, suffix);
      if let Err(e) = std::fs::remove_file(&sidecar)
         && e.kind() != std::io::ErrorKind::NotFound
      {
         return Err(Error::Io(e));
      }
   }
   Ok(())
}

fn sidecar_path(path: &Path, suffix: &str) -> PathBuf {
   let mut name = OsString::from(path.as_os_str());
   name.push(suffix);
   PathBuf::from(name)
}
