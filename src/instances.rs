//! Table of databases a host currently has open, keyed by database name

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use sqlx_sqlcipher_conn_mgr::{SqliteDatabase, remove_sidecars};
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::resolve::validate_database_name;
use crate::{AssetRef, DatabaseOpener, Error, HostContext, OpenFlags, Result};

/// Databases opened through a [`DatabaseOpener`], by name.
///
/// A name stays mapped to one handle until it is closed, so repeated opens from
/// a host bridge share connections. The key of a repeated open is not checked
/// against the cached handle.
pub struct OpenedDatabases<C> {
   opener: DatabaseOpener<C>,
   instances: RwLock<HashMap<String, Arc<SqliteDatabase>>>,
}

impl<C: HostContext> OpenedDatabases<C> {
   pub fn new(opener: DatabaseOpener<C>) -> Self {
      Self {
         opener,
         instances: RwLock::new(HashMap::new()),
      }
   }

   pub fn opener(&self) -> &DatabaseOpener<C> {
      &self.opener
   }

   /// Return the open handle for `name`, or open it with
   /// [`DatabaseOpener::open_with_encryption`] and remember it.
   pub async fn open(
      &self,
      name: &str,
      key: Option<&str>,
      asset: Option<&AssetRef>,
      flags: OpenFlags,
   ) -> Result<Arc<SqliteDatabase>> {
      if let Some(db) = live(&*self.instances.read().await, name) {
         return Ok(db);
      }

      let mut instances = self.instances.write().await;

      // Another task may have opened it while we waited for the write lock
      if let Some(db) = live(&instances, name) {
         return Ok(db);
      }

      // A handle closed behind our back is stale
      if instances.remove(name).is_some() {
         debug!("Evicted closed handle for {}", name);
      }

      let db = self
         .opener
         .open_with_encryption(name, key, asset, flags)
         .await
         .into_result()?;

      instances.insert(name.to_string(), Arc::clone(&db));

      Ok(db)
   }

   pub async fn get(&self, name: &str) -> Result<Arc<SqliteDatabase>> {
      live(&*self.instances.read().await, name)
         .ok_or_else(|| Error::DatabaseNotOpen(name.to_string()))
   }

   pub async fn is_open(&self, name: &str) -> bool {
      live(&*self.instances.read().await, name).is_some()
   }

   /// Close `name`.
   ///
   /// Returns `false` if it was not open.
   pub async fn close(&self, name: &str) -> Result<bool> {
      let mut instances = self.instances.write().await;

      match instances.remove(name) {
         Some(db) if !db.is_closed() => {
            db.close().await?;
            Ok(true)
         }
         _ => Ok(false),
      }
   }

   /// Close every open database, reporting the first failure after trying all.
   pub async fn close_all(&self) -> Result<()> {
      let mut instances = self.instances.write().await;

      let mut first_err = None;
      for (name, db) in instances.drain() {
         if let Err(e) = db.close().await {
            error!("Failed to close {}: {}", name, e);
            first_err.get_or_insert(e);
         }
      }

      match first_err {
         Some(e) => Err(e.into()),
         None => Ok(()),
      }
   }

   /// Close `name` if open, then delete its file at the standard database path
   /// together with the WAL, SHM and journal siblings.
   ///
   /// Read-only opens of an external file never delete that file. Returns whether
   /// a database file was removed.
   pub async fn delete(&self, name: &str) -> Result<bool> {
      validate_database_name(name)?;

      let mut instances = self.instances.write().await;

      if let Some(db) = instances.remove(name) {
         db.close().await?;
      }

      let db_file = self.opener.context().database_path(name);

      match std::fs::remove_file(&db_file) {
         Ok(()) => {
            remove_sidecars(&db_file)?;
            debug!("Deleted database {}", db_file.display());
            Ok(true)
         }
         Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
         Err(e) => Err(e.into()),
      }
   }
}

/// The cached handle for `name`, unless it has been closed.
fn live(instances: &HashMap<String, Arc<SqliteDatabase>>, name: &str) -> Option<Arc<SqliteDatabase>> {
   instances.get(name).filter(|db| !db.is_closed()).cloned()
}
