use serde::{Serialize, Serializer};

/// Result type alias for opener operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structured error response for a host bridge.
#[derive(Serialize)]
struct ErrorResponse {
   code: String,
   message: String,
}

/// Error types for opening and preparing databases.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlcipher_conn_mgr::Error),

   /// I/O error when accessing database or asset files.
   #[error("io error: {0}")]
   Io(#[from] std::io::Error),

   /// The referenced asset does not exist in the bundle or files directory.
   #[error("asset not found: {0}")]
   AssetNotFound(String),

   /// Invalid database or asset path provided.
   #[error("invalid path: {0}")]
   InvalidPath(String),

   /// Open flag combination other than read-write or read-only with create.
   #[error("unsupported open flags: {0:#x}")]
   InvalidOpenFlags(i32),

   /// The handle handed to the encryption pass is backed by a different file.
   #[error("handle is backed by {actual}, expected {expected}")]
   PathMismatch { expected: String, actual: String },

   /// The plaintext file is held open elsewhere, so it cannot be replaced.
   #[error("database {0} is in use and cannot be encrypted in place")]
   DatabaseInUse(String),

   /// Attempted to access a database that hasn't been opened.
   #[error("database {0} not open")]
   DatabaseNotOpen(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) | Error::ConnectionManager(sqlx_sqlcipher_conn_mgr::Error::Sqlx(e)) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(sqlx_sqlcipher_conn_mgr::Error::NotADatabase(_)) => {
            "NOT_A_DATABASE".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Io(_) => "IO_ERROR".to_string(),
         Error::AssetNotFound(_) => "ASSET_NOT_FOUND".to_string(),
         Error::InvalidPath(_) => "INVALID_PATH".to_string(),
         Error::InvalidOpenFlags(_) => "INVALID_OPEN_FLAGS".to_string(),
         Error::PathMismatch { .. } => "PATH_MISMATCH".to_string(),
         Error::DatabaseInUse(_) => "DATABASE_IN_USE".to_string(),
         Error::DatabaseNotOpen(_) => "DATABASE_NOT_OPEN".to_string(),
      }
   }
}

impl Serialize for Error {
   fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
   where
      S: Serializer,
   {
      let response = ErrorResponse {
         code: self.error_code(),
         message: self.to_string(),
      };
      response.serialize(serializer)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_serializes_code_and_message() {
      let value = serde_json::to_value(Error::AssetNotFound("www/app.db".into())).unwrap();

      assert_eq!(value["code"], "ASSET_NOT_FOUND");
      assert_eq!(value["message"], "asset not found: www/app.db");
   }

   #[test]
   fn test_wrong_key_has_dedicated_code() {
      let err = Error::from(sqlx_sqlcipher_conn_mgr::Error::NotADatabase("a.db".into()));
      assert_eq!(err.error_code(), "NOT_A_DATABASE");
   }

   #[test]
   fn test_invalid_flags_message_is_hex() {
      assert_eq!(
         Error::InvalidOpenFlags(0x2).to_string(),
         "unsupported open flags: 0x2"
      );
   }
}
