//! SQLCipher database with keyed connection pools and optional write access

use crate::Result;
use crate::cipher::{quote_literal, remove_sidecars};
use crate::config::SqliteDatabaseConfig;
use crate::error::Error;
use crate::registry::{get_or_open_database, uncache_database};
use crate::write_guard::WriteGuard;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error};

/// Extended result code SQLite (and SQLCipher) report when a page cannot be decoded.
const SQLITE_NOTADB: &str = "26";

/// SQLCipher database with connection pooling for concurrent reads and exclusive writes.
///
/// Every pooled connection applies the same key before any other statement, so
/// callers never see an un-keyed connection. An instance opened without a key is
/// an ordinary plaintext SQLite database.
///
/// # Example
///
/// ```no_run
/// use sqlx_sqlcipher_conn_mgr::SqliteDatabase;
///
/// # async fn example() -> Result<(), sqlx_sqlcipher_conn_mgr::Error> {
/// let db = SqliteDatabase::connect("test.db", Some("secret"), None).await?;
///
/// let rows = sqlx::query("SELECT * FROM users")
///     .fetch_all(db.read_pool()?)
///     .await?;
///
/// db.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqliteDatabase {
   /// Pool of read-only connections for concurrent reads
   read_pool: Pool<Sqlite>,

   /// Single read-write connection pool (max_connections=1) for serialized writes
   write_conn: Pool<Sqlite>,

   /// Tracks if WAL mode has been initialized (set on first write)
   wal_initialized: AtomicBool,

   /// Marks database as closed to prevent further operations
   closed: AtomicBool,

   /// Refuses the writer when set
   read_only: bool,

   /// Key the pools were opened with, used to reject cache hits with a different key
   key: Option<String>,

   /// Path to database file (used for cleanup and registry lookups)
   path: PathBuf,
}

impl SqliteDatabase {
   /// Connect to a SQLite database, applying `key` when one is given
   ///
   /// If the file is already open in this process with the same key, returns the
   /// existing instance. An empty key is treated as no key.
   ///
   /// The database file is created if it doesn't exist. The key is verified by
   /// reading the schema; a wrong key (or a missing key on an encrypted file)
   /// fails with [`Error::NotADatabase`].
   ///
   /// # Arguments
   ///
   /// * `path` - Path to the database file (will be created if missing)
   /// * `key` - SQLCipher passphrase, or `None` for a plaintext database
   /// * `custom_config` - Optional pool configuration. Pass `None` for defaults.
   pub async fn connect(
      path: impl AsRef<Path>,
      key: Option<&str>,
      custom_config: Option<SqliteDatabaseConfig>,
   ) -> Result<Arc<Self>> {
      let config = custom_config.unwrap_or_default();
      let path = path.as_ref();
      let key = key.filter(|k| !k.is_empty());

      if path.as_os_str().is_empty() {
         return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Database path cannot be empty",
         )));
      }

      let path = path.to_path_buf();

      get_or_open_database(&path, key, || async {
         let idle_timeout = Some(Duration::from_secs(config.idle_timeout_secs));

         // The read pool cannot create the file, so make sure it exists first.
         // The keyed temporary connection is dropped right away.
         if !path.exists() {
            debug!("Creating database file {}", path.display());
            let conn = keyed_options(&path, key)
               .create_if_missing(true)
               .read_only(false)
               .connect()
               .await
               .map_err(|e| classify(e, &path))?;
            drop(conn);
         }

         let read_pool = SqlitePoolOptions::new()
            .max_connections(config.max_read_connections)
            .min_connections(0)
            .idle_timeout(idle_timeout)
            .connect_with(keyed_options(&path, key).read_only(true))
            .await
            .map_err(|e| classify(e, &path))?;

         // Without this read a wrong key is only noticed on the caller's first query
         if let Err(e) = sqlx::query("SELECT count(*) FROM sqlite_master")
            .fetch_one(&read_pool)
            .await
         {
            read_pool.close().await;
            return Err(classify(e, &path));
         }

         let write_conn = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .idle_timeout(idle_timeout)
            .connect_with(keyed_options(&path, key).read_only(false))
            .await
            .map_err(|e| classify(e, &path))?;

         Ok(Self {
            read_pool,
            write_conn,
            wal_initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            read_only: config.read_only,
            key: key.map(str::to_owned),
            path: path.clone(),
         })
      })
      .await
   }

   /// Path of the backing database file
   pub fn path(&self) -> &Path {
      &self.path
   }

   /// Whether the connections were opened with a key
   pub fn is_encrypted(&self) -> bool {
      self.key.is_some()
   }

   pub fn is_closed(&self) -> bool {
      self.closed.load(Ordering::SeqCst)
   }

   pub(crate) fn matches_key(&self, key: Option<&str>) -> bool {
      self.key.as_deref() == key
   }

   /// Get a reference to the connection pool for executing read queries
   pub fn read_pool(&self) -> Result<&Pool<Sqlite>> {
      if self.is_closed() {
         return Err(Error::DatabaseClosed);
      }
      Ok(&self.read_pool)
   }

   /// Acquire exclusive write access to the database
   ///
   /// On the first call, this method enables WAL mode on the database.
   /// Fails with [`Error::ReadOnly`] if the database was opened read-only.
   pub async fn acquire_writer(&self) -> Result<WriteGuard> {
      if self.is_closed() {
         return Err(Error::DatabaseClosed);
      }

      if self.read_only {
         return Err(Error::ReadOnly);
      }

      // Acquire connection from pool (max=1 ensures exclusive access)
      let mut conn = self.write_conn.acquire().await?;

      if !self.wal_initialized.load(Ordering::SeqCst) {
         sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&mut *conn)
            .await?;

         // https://www.sqlite.org/wal.html#performance_considerations
         sqlx::query("PRAGMA synchronous = NORMAL")
            .execute(&mut *conn)
            .await?;

         self.wal_initialized.store(true, Ordering::SeqCst);
      }

      Ok(WriteGuard::new(conn))
   }

   /// Close the database and clean up resources
   ///
   /// Removes the instance from the cache and closes both pools. Any other clone
   /// of this `Arc` observes [`Error::DatabaseClosed`] afterwards.
   pub async fn close(self: Arc<Self>) -> Result<()> {
      self.closed.store(true, Ordering::SeqCst);

      if let Err(e) = uncache_database(&self.path).await {
         error!("Failed to remove database from cache: {}", e);
      }

      // This will await all readers to be returned
      self.read_pool.close().await;

      // Checkpoint WAL before closing the write connection so the main file is complete
      if self.wal_initialized.load(Ordering::SeqCst)
         && let Ok(mut conn) = self.write_conn.acquire().await
      {
         let _ = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&mut *conn)
            .await;
      }

      self.write_conn.close().await;

      Ok(())
   }

   /// Close the database and delete the database file with its WAL, SHM and
   /// journal siblings. Use with caution!
   pub async fn remove(self: Arc<Self>) -> Result<()> {
      let path = self.path.clone();

      self.close().await?;

      // The main file should exist, so a failure here is reported
      std::fs::remove_file(&path).map_err(Error::Io)?;
      remove_sidecars(&path)?;

      Ok(())
   }
}

/// Connect options for `path` with `PRAGMA key` applied when a key is given.
///
/// sqlx issues the key pragma ahead of every other pragma on the connection.
pub(crate) fn keyed_options(path: &Path, key: Option<&str>) -> SqliteConnectOptions {
   let options = SqliteConnectOptions::new().filename(path);
   match key {
      Some(key) => options.pragma("key", quote_literal(key)),
      None => options,
   }
}

/// Map SQLITE_NOTADB to [`Error::NotADatabase`], pass everything else through.
pub(crate) fn classify(err: sqlx::Error, path: &Path) -> Error {
   let not_a_database = err
      .as_database_error()
      .and_then(|db_err| db_err.code())
      .is_some_and(|code| code == SQLITE_NOTADB);

   if not_a_database {
      Error::NotADatabase(path.display().to_string())
   } else {
      Error::Sqlx(err)
   }
}
