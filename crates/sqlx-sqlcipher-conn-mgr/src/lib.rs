//! # sqlx-sqlcipher-conn-mgr
//!
//! A minimal wrapper around SQLx for SQLCipher-encrypted SQLite databases on
//! mobile and desktop applications.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: Database handle with separate read and write connection pools,
//!   each connection keyed with the same SQLCipher passphrase
//! - **[`SqliteDatabaseConfig`]**: Configuration for connection pool settings
//! - **[`WriteGuard`]**: RAII guard ensuring exclusive write access
//! - **[`export_encrypted`]**: Copies a database into a new encrypted file via `sqlcipher_export`
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **Keyed pools**: `PRAGMA key` is applied before anything else on every pooled connection
//! - **Key verification**: a schema read at connect time rejects wrong keys up front
//! - **Lazy WAL mode**: Write-Ahead Logging enabled automatically on first write
//! - **Instance cache**: connecting twice to the same file returns the same handle
//!
//! ## Usage
//!
//! ```no_run
//! use sqlx_sqlcipher_conn_mgr::SqliteDatabase;
//!
//! #[tokio::main]
//! async fn main() -> sqlx_sqlcipher_conn_mgr::Result<()> {
//!     // Open (or create) an encrypted database
//!     let db = SqliteDatabase::connect("secrets.db", Some("passphrase"), None).await?;
//!
//!     let mut writer = db.acquire_writer().await?;
//!     sqlx::query("CREATE TABLE IF NOT EXISTS notes (body TEXT)")
//!         .execute(&mut *writer)
//!         .await?;
//!     drop(writer);
//!
//!     let rows = sqlx::query("SELECT body FROM notes")
//!         .fetch_all(db.read_pool()?)
//!         .await?;
//!     assert!(rows.is_empty());
//!
//!     db.close().await?;
//!     Ok(())
//! }
//! ```
mod cipher;
mod config;
mod database;
mod error;
mod registry;
mod write_guard;

// Re-export public types
pub use cipher::{ExportReport, export_encrypted, is_valid_schema_name, remove_sidecars};
pub use config::SqliteDatabaseConfig;
pub use database::SqliteDatabase;
pub use error::Error;
pub use write_guard::WriteGuard;

/// A type alias for Results with our custom Error type
pub type Result<T> = std::result::Result<T, Error>;
