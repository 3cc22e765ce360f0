//! Integration tests for export-based encryption

use sqlx_sqlcipher_conn_mgr::{Error, SqliteDatabase, export_encrypted};
use tempfile::TempDir;

async fn plaintext_with_rows(temp_dir: &TempDir) -> std::sync::Arc<SqliteDatabase> {
   let db = SqliteDatabase::connect(temp_dir.path().join("plain.db"), None, None)
      .await
      .unwrap();

   let mut writer = db.acquire_writer().await.unwrap();
   sqlx::query("CREATE TABLE notes (id INTEGER PRIMARY KEY AUTOINCREMENT, body TEXT)")
      .execute(&mut *writer)
      .await
      .unwrap();
   sqlx::query("CREATE INDEX notes_body ON notes (body)")
      .execute(&mut *writer)
      .await
      .unwrap();
   sqlx::query("INSERT INTO notes (body) VALUES ('first'), ('second'), ('third')")
      .execute(&mut *writer)
      .await
      .unwrap();

   db
}

#[tokio::test]
async fn test_export_produces_encrypted_copy() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;

   let target = temp_dir.path().join("export.db");
   std::fs::File::create(&target).unwrap();

   let report = export_encrypted(&db, &target, "s3cret", "encrypted")
      .await
      .unwrap();
   assert!(report.schema_objects >= 2);

   // Source remains usable and unchanged
   let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM notes")
      .fetch_one(db.read_pool().unwrap())
      .await
      .unwrap();
   assert_eq!(count, 3);
   db.close().await.unwrap();

   let exported = SqliteDatabase::connect(&target, Some("s3cret"), None)
      .await
      .unwrap();
   let bodies: Vec<(String,)> = sqlx::query_as("SELECT body FROM notes ORDER BY id")
      .fetch_all(exported.read_pool().unwrap())
      .await
      .unwrap();
   assert_eq!(
      bodies.into_iter().map(|(b,)| b).collect::<Vec<_>>(),
      vec!["first", "second", "third"]
   );
   exported.close().await.unwrap();

   let without_key = SqliteDatabase::connect(&target, None, None).await;
   assert!(matches!(without_key, Err(Error::NotADatabase(_))));
}

#[tokio::test]
async fn test_export_rejects_invalid_schema_name() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;
   let target = temp_dir.path().join("export.db");

   let result = export_encrypted(&db, &target, "k", "enc; DROP TABLE notes").await;
   assert!(matches!(result, Err(Error::InvalidSchemaName(_))));

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_attach_leaves_writer_usable() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;
   let target = temp_dir.path().join("export.db");

   // "main" is always in use on a connection, so ATTACH fails
   let result = export_encrypted(&db, &target, "k", "main").await;
   assert!(matches!(result, Err(Error::Sqlx(_))));

   let mut writer = db.acquire_writer().await.unwrap();
   sqlx::query("INSERT INTO notes (body) VALUES ('fourth')")
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_export_from_read_only_database_fails() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;
   let path = db.path().to_path_buf();
   db.close().await.unwrap();

   let config = sqlx_sqlcipher_conn_mgr::SqliteDatabaseConfig {
      read_only: true,
      ..Default::default()
   };
   let db = SqliteDatabase::connect(&path, None, Some(config)).await.unwrap();

   let result = export_encrypted(&db, &temp_dir.path().join("export.db"), "k", "encrypted").await;
   assert!(matches!(result, Err(Error::ReadOnly)));

   db.close().await.unwrap();
}

/// Encrypted file at `path` holding a single table called `table`.
async fn encrypted_with_table(path: &std::path::Path, key: &str, table: &str) {
   let db = SqliteDatabase::connect(path, Some(key), None).await.unwrap();
   let mut writer = db.acquire_writer().await.unwrap();
   sqlx::query(&format!("CREATE TABLE {table} (id INTEGER PRIMARY KEY)"))
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);
   db.close().await.unwrap();
}

#[tokio::test]
async fn test_failed_export_detaches_and_leaves_writer_usable() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;

   // The target already has a `notes` table, so sqlcipher_export cannot create it
   let target = temp_dir.path().join("export.db");
   encrypted_with_table(&target, "k", "notes").await;

   let result = export_encrypted(&db, &target, "k", "encrypted").await;
   assert!(matches!(result, Err(Error::Sqlx(_))));

   let mut writer = db.acquire_writer().await.unwrap();
   let (attached,): (i64,) =
      sqlx::query_as("SELECT count(*) FROM pragma_database_list WHERE name = 'encrypted'")
         .fetch_one(&mut *writer)
         .await
         .unwrap();
   assert_eq!(attached, 0);

   sqlx::query("INSERT INTO notes (body) VALUES ('fourth')")
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);

   db.close().await.unwrap();
}

#[tokio::test]
async fn test_export_with_extra_objects_fails_verification() {
   let temp_dir = TempDir::new().unwrap();
   let db = plaintext_with_rows(&temp_dir).await;

   // A table the source does not have survives the export and skews the count
   let target = temp_dir.path().join("export.db");
   encrypted_with_table(&target, "k", "leftover").await;

   let result = export_encrypted(&db, &target, "k", "encrypted").await;
   match result {
      Err(Error::ExportVerificationFailed { expected, found }) => {
         assert_eq!(found, expected + 1);
      }
      other => panic!("expected verification failure, got {other:?}"),
   }

   db.close().await.unwrap();
}
