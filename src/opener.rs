use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx_sqlcipher_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig, export_encrypted, remove_sidecars};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::resolve::resolve_database_file;
use crate::{AssetRef, Error, HostContext, OpenFlags, OpenerConfig, Result};

/// Which path [`DatabaseOpener::open_with_encryption`] took.
#[derive(Debug)]
pub enum OpenOutcome {
   /// Opened without a key because none was requested.
   Plain(Arc<SqliteDatabase>),
   /// Opened with the requested key.
   ///
   /// `migrated` is true when the file was plaintext and has just been
   /// encrypted in place; false when it was already encrypted.
   Encrypted {
      db: Arc<SqliteDatabase>,
      migrated: bool,
   },
   /// No method of opening the database worked.
   Failed(Error),
}

impl OpenOutcome {
   pub fn is_open(&self) -> bool {
      !matches!(self, OpenOutcome::Failed(_))
   }

   /// The handle, if one was opened.
   pub fn into_database(self) -> Option<Arc<SqliteDatabase>> {
      self.into_result().ok()
   }

   pub fn into_result(self) -> Result<Arc<SqliteDatabase>> {
      match self {
         OpenOutcome::Plain(db) | OpenOutcome::Encrypted { db, .. } => Ok(db),
         OpenOutcome::Failed(e) => Err(e),
      }
   }

   pub fn error(&self) -> Option<&Error> {
      match self {
         OpenOutcome::Failed(e) => Some(e),
         _ => None,
      }
   }
}

/// Opens databases on behalf of a host application.
///
/// Holds no per-database state: every call resolves, seeds and opens from
/// scratch, delegating file locations and asset access to the [`HostContext`].
///
/// # Example
///
/// ```no_run
/// use sqlcipher_storage::{AssetRef, DatabaseOpener, DirectoryContext, OpenFlags};
///
/// # async fn example() {
/// let opener = DatabaseOpener::new(DirectoryContext::under("/data/app"));
/// let outcome = opener
///    .open_with_encryption("app.db", Some("passphrase"), AssetRef::parse(Some("1")).as_ref(), OpenFlags::ReadWrite)
///    .await;
///
/// if let Some(db) = outcome.into_database() {
///    db.close().await.ok();
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DatabaseOpener<C> {
   context: C,
   config: OpenerConfig,
}

impl<C: HostContext> DatabaseOpener<C> {
   pub fn new(context: C) -> Self {
      Self::with_config(context, OpenerConfig::default())
   }

   pub fn with_config(context: C, config: OpenerConfig) -> Self {
      Self { context, config }
   }

   pub fn context(&self) -> &C {
      &self.context
   }

   pub fn config(&self) -> &OpenerConfig {
      &self.config
   }

   /// Resolve the file backing database `name`, seeding it from `asset` if needed.
   ///
   /// See [`resolve_database_file`] for the resolution order.
   pub fn resolve_file(
      &self,
      name: &str,
      flags: OpenFlags,
      asset: Option<&AssetRef>,
   ) -> Result<PathBuf> {
      resolve_database_file(&self.context, &self.config, name, flags, asset)
   }

   /// Resolve the file and open or create it with `key`.
   ///
   /// `None` or an empty key opens the file as plaintext. Engine errors (wrong
   /// key, corrupt or locked file) are returned unchanged.
   pub async fn open(
      &self,
      name: &str,
      key: Option<&str>,
      asset: Option<&AssetRef>,
      flags: OpenFlags,
   ) -> Result<Arc<SqliteDatabase>> {
      let db_file = self.resolve_file(name, flags, asset)?;

      info!("Opening sqlite db: {}", db_file.display());
      let db = SqliteDatabase::connect(&db_file, key, Some(self.pool_config(flags))).await?;

      Ok(db)
   }

   /// Open `name`, encrypting it in place first if it is still plaintext.
   ///
   /// 1. Try to open without a key.
   /// 2. If that works and a key was requested, encrypt the file in place and
   ///    reopen it with the key.
   /// 3. If it fails, the file may already be encrypted: open it with the key.
   ///
   /// Never returns an error directly; the outcome says which path was taken and
   /// carries the last error when nothing worked.
   pub async fn open_with_encryption(
      &self,
      name: &str,
      key: Option<&str>,
      asset: Option<&AssetRef>,
      flags: OpenFlags,
   ) -> OpenOutcome {
      let key = key.filter(|k| !k.is_empty());

      match self.open(name, None, asset, flags).await {
         Ok(db) => {
            let Some(key) = key else {
               return OpenOutcome::Plain(db);
            };

            // Another holder of the cached plaintext handle would be closed under it
            if Arc::strong_count(&db) > 1 {
               warn!("Not encrypting {} in place, it is open elsewhere", name);
               return OpenOutcome::Failed(Error::DatabaseInUse(name.to_string()));
            }

            if let Err(e) = self.encrypt_in_place(db, name, key, asset, flags).await {
               warn!("Could not encrypt {} in place: {}", name, e);
               return OpenOutcome::Failed(e);
            }

            match self.open(name, Some(key), asset, flags).await {
               Ok(db) => OpenOutcome::Encrypted { db, migrated: true },
               Err(e) => {
                  warn!("Could not reopen {} after encrypting it: {}", name, e);
                  OpenOutcome::Failed(e)
               }
            }
         }
         Err(plain_err) => {
            let Some(key) = key else {
               warn!("Could not open {}: {}", name, plain_err);
               return OpenOutcome::Failed(plain_err);
            };

            debug!("Unkeyed open of {} failed, retrying with key: {}", name, plain_err);

            match self.open(name, Some(key), asset, flags).await {
               Ok(db) => OpenOutcome::Encrypted {
                  db,
                  migrated: false,
               },
               Err(e) => {
                  warn!("Could not open {} with or without key: {}", name, e);
                  OpenOutcome::Failed(e)
               }
            }
         }
      }
   }

   /// Replace the plaintext file behind `db` with an encrypted copy.
   ///
   /// The copy is exported into a temporary file beside the original, verified,
   /// and renamed over the original only after `db` is closed. The temporary file
   /// is removed on every failure. Before the rename the original keeps its
   /// contents, although exporting through the writer switches it to WAL mode.
   /// `db` is closed whether or not the pass succeeds, which also closes every
   /// other clone of it.
   pub async fn encrypt_in_place(
      &self,
      db: Arc<SqliteDatabase>,
      name: &str,
      key: &str,
      asset: Option<&AssetRef>,
      flags: OpenFlags,
   ) -> Result<()> {
      let exported = self.export_beside(&db, name, key, asset, flags).await;

      // The rename below needs every connection to the original closed
      let closed = db.close().await;

      let (original, staging) = exported?;
      closed?;

      staging.persist(&original).map_err(|e| e.error)?;
      discard_sidecars(&original);

      info!("Encrypted {} in place", original.display());
      Ok(())
   }

   /// Export `db` into a fresh temporary file in the same directory.
   async fn export_beside(
      &self,
      db: &SqliteDatabase,
      name: &str,
      key: &str,
      asset: Option<&AssetRef>,
      flags: OpenFlags,
   ) -> Result<(PathBuf, NamedTempFile)> {
      let original = self.resolve_file(name, flags, asset)?;
      if original != db.path() {
         return Err(Error::PathMismatch {
            expected: original.display().to_string(),
            actual: db.path().display().to_string(),
         });
      }

      let dir = original
         .parent()
         .ok_or_else(|| Error::InvalidPath(format!("no parent directory: {}", original.display())))?;

      let staging = tempfile::Builder::new()
         .prefix(&self.config.temp_prefix)
         .suffix(&self.config.temp_suffix)
         .tempfile_in(dir)?;

      let report = export_encrypted(db, staging.path(), key, &self.config.export_schema).await?;
      debug!(
         "Exported {} schema objects from {} into {}",
         report.schema_objects,
         original.display(),
         staging.path().display()
      );

      Ok((original, staging))
   }

   fn pool_config(&self, flags: OpenFlags) -> SqliteDatabaseConfig {
      let mut config = self.config.pool.clone();
      config.read_only |= flags.is_read_only();
      config
   }
}

/// Remove the plaintext's leftover sidecars once the encrypted file is in place.
///
/// Failures are logged only: the encrypted file is already complete.
fn discard_sidecars(db_file: &Path) {
   if let Err(e) = remove_sidecars(db_file) {
      warn!("Could not remove sidecars of {}: {}", db_file.display(), e);
   }
}
