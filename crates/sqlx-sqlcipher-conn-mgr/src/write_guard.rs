//! WriteGuard for exclusive write access to the database

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;
use std::ops::{Deref, DerefMut};

/// RAII guard over the single keyed write connection.
///
/// Only one `WriteGuard` exists at a time per database (the write pool holds
/// one connection), so statements issued through it are serialized. The
/// connection returns to the pool on drop.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlcipher_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), sqlx_sqlcipher_conn_mgr::Error> {
/// let db = SqliteDatabase::connect("vault.db", Some("passphrase"), None).await?;
/// let mut writer = db.acquire_writer().await?;
/// sqlx::query("INSERT INTO entries (label) VALUES (?)")
///     .bind("bank")
///     .execute(&mut *writer)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct WriteGuard {
   conn: PoolConnection<Sqlite>,
}

impl WriteGuard {
   pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
      Self { conn }
   }
}

impl Deref for WriteGuard {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for WriteGuard {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
