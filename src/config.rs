use serde::{Deserialize, Serialize};
use sqlx_sqlcipher_conn_mgr::SqliteDatabaseConfig;

/// Settings for [`DatabaseOpener`](crate::DatabaseOpener).
///
/// Every field has a default, so hosts can deserialize a partial document.
///
/// ```
/// use sqlcipher_storage::OpenerConfig;
///
/// let config = OpenerConfig {
///     bundle_subdir: "assets".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.export_schema, "encrypted");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenerConfig {
   /// Bundle directory searched for the default asset layout.
   ///
   /// Default: `"www"`
   pub bundle_subdir: String,

   /// Prefix of the temporary file the encrypted copy is written to.
   ///
   /// Default: `"temp_db"`
   pub temp_prefix: String,

   /// Suffix of the temporary file the encrypted copy is written to.
   ///
   /// Default: `"temp"`
   pub temp_suffix: String,

   /// Schema name the encrypted copy is attached under while exporting.
   ///
   /// Must be a plain identifier.
   ///
   /// Default: `"encrypted"`
   pub export_schema: String,

   /// Buffer size, in bytes, used when seeding a database from an asset.
   ///
   /// Default: 1024
   pub copy_buffer_size: usize,

   /// Connection pool settings for every handle the opener returns.
   ///
   /// `read_only` is forced on for read-only opens.
   pub pool: SqliteDatabaseConfig,
}

impl Default for OpenerConfig {
   fn default() -> Self {
      Self {
         bundle_subdir: "www".to_string(),
         temp_prefix: "temp_db".to_string(),
         temp_suffix: "temp".to_string(),
         export_schema: "encrypted".to_string(),
         copy_buffer_size: 1024,
         pool: SqliteDatabaseConfig::default(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_partial_document() {
      let config: OpenerConfig = serde_json::from_str(
         r#"{ "bundleSubdir": "assets", "pool": { "max_read_connections": 2 } }"#,
      )
      .unwrap();

      assert_eq!(config.bundle_subdir, "assets");
      assert_eq!(config.temp_prefix, "temp_db");
      assert_eq!(config.copy_buffer_size, 1024);
      assert_eq!(config.pool.max_read_connections, 2);
      assert_eq!(config.pool.idle_timeout_secs, 30);
   }
}
