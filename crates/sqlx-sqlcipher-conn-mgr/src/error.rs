//! Error types for sqlx-sqlcipher-conn-mgr

use thiserror::Error;

/// Errors that may occur when working with sqlx-sqlcipher-conn-mgr
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when accessing database files. Standard library IO errors
   /// are converted to this variant.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library. Standard sqlx errors are converted to this variant
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// Writer requested on a database opened read-only
   #[error("Database was opened read-only")]
   ReadOnly,

   /// The file could not be read with the supplied key. Either the key is wrong,
   /// an encrypted file was opened without a key, or the file is not a database.
   #[error("File is not a database or the key is incorrect: {0}")]
   NotADatabase(String),

   /// The database is already open in this process with a different key
   #[error("Database '{0}' is already open with a different key")]
   KeyMismatch(String),

   /// Invalid schema name provided for an attached database
   #[error(
      "Invalid schema name '{0}': must contain only alphanumeric characters and underscores, and cannot start with a digit"
   )]
   InvalidSchemaName(String),

   /// The exported copy does not contain the same schema as the source
   #[error("Encrypted export verification failed: expected {expected} schema objects, found {found}")]
   ExportVerificationFailed { expected: i64, found: i64 },
}
