//! Process-wide cache of open databases, keyed by canonical file path

use crate::Result;
use crate::database::SqliteDatabase;
use crate::error::Error;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Weak};
use tokio::sync::Mutex;
use tracing::trace;

/// Weak so that dropping the last handle frees the pools without an explicit close.
static DATABASES: LazyLock<Mutex<HashMap<PathBuf, Weak<SqliteDatabase>>>> =
   LazyLock::new(|| Mutex::new(HashMap::new()));

/// Return the live instance cached for `path`, or open a new one with `open`.
///
/// The lock is held while opening so two callers racing on the same file
/// cannot end up with separate pools.
pub(crate) async fn get_or_open_database<F, Fut>(
   path: &Path,
   key: Option<&str>,
   open: F,
) -> Result<Arc<SqliteDatabase>>
where
   F: FnOnce() -> Fut,
   Fut: Future<Output = Result<SqliteDatabase>>,
{
   let cache_key = registry_key(path)?;
   let mut databases = DATABASES.lock().await;

   if let Some(db) = databases
      .get(&cache_key)
      .and_then(Weak::upgrade)
      .filter(|db| !db.is_closed())
   {
      if !db.matches_key(key) {
         return Err(Error::KeyMismatch(path.display().to_string()));
      }
      trace!("Reusing cached database {}", cache_key.display());
      return Ok(db);
   }

   let db = Arc::new(open().await?);

   databases.retain(|_, weak| weak.strong_count() > 0);
   databases.insert(cache_key, Arc::downgrade(&db));

   Ok(db)
}

/// Drop the cache entry for `path`. Missing entries are not an error.
pub(crate) async fn uncache_database(path: &Path) -> Result<()> {
   let cache_key = registry_key(path)?;
   DATABASES.lock().await.remove(&cache_key);
   Ok(())
}

/// Canonical parent directory joined with the file name.
///
/// The file itself may not exist yet, so only the parent is canonicalized.
fn registry_key(path: &Path) -> Result<PathBuf> {
   let file_name = path.file_name().ok_or_else(|| {
      Error::Io(std::io::Error::new(
         std::io::ErrorKind::InvalidInput,
         format!("database path has no file name: {}", path.display()),
      ))
   })?;

   let parent = match path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
   };

   Ok(parent.canonicalize()?.join(file_name))
}
