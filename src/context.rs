use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

/// Filesystem and asset services supplied by the host application.
///
/// The opener never touches platform APIs directly; everything it needs about
/// where files live goes through this trait, which keeps the resolution logic
/// testable against plain directories or in-memory fakes.
pub trait HostContext: Send + Sync {
   /// Open a read-only asset bundled with the application.
   fn open_bundle_asset(&self, path: &str) -> io::Result<Box<dyn Read + Send>>;

   /// The app's private files directory.
   fn files_dir(&self) -> PathBuf;

   /// Standard location of the database file called `name`.
   fn database_path(&self, name: &str) -> PathBuf;
}

/// [`HostContext`] backed by three directories on disk.
///
/// Desktop hosts and tests point these at real directories; mobile hosts that
/// unpack their bundle to disk can do the same.
#[derive(Debug, Clone)]
pub struct DirectoryContext {
   bundle_dir: PathBuf,
   files_dir: PathBuf,
   databases_dir: PathBuf,
}

impl DirectoryContext {
   pub fn new(
      bundle_dir: impl Into<PathBuf>,
      files_dir: impl Into<PathBuf>,
      databases_dir: impl Into<PathBuf>,
   ) -> Self {
      Self {
         bundle_dir: bundle_dir.into(),
         files_dir: files_dir.into(),
         databases_dir: databases_dir.into(),
      }
   }

   /// Lay out `bundle/`, `files/` and `databases/` under one root.
   pub fn under(root: impl AsRef<Path>) -> Self {
      let root = root.as_ref();
      Self::new(
         root.join("bundle"),
         root.join("files"),
         root.join("databases"),
      )
   }

   pub fn bundle_dir(&self) -> &Path {
      &self.bundle_dir
   }
}

impl HostContext for DirectoryContext {
   fn open_bundle_asset(&self, path: &str) -> io::Result<Box<dyn Read + Send>> {
      let relative = Path::new(path);

      // Bundles are read-only trees; nothing may resolve outside of them
      if !stays_inside(relative) {
         return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("asset path escapes the bundle: {}", path),
         ));
      }

      Ok(Box::new(File::open(self.bundle_dir.join(relative))?))
   }

   fn files_dir(&self) -> PathBuf {
      self.files_dir.clone()
   }

   fn database_path(&self, name: &str) -> PathBuf {
      self.databases_dir.join(name)
   }
}

/// Whether `relative` only descends, so joining it onto a directory stays inside it.
pub(crate) fn stays_inside(relative: &Path) -> bool {
   relative
      .components()
      .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
   use super::*;
   use tempfile::TempDir;

   #[test]
   fn test_reads_bundle_asset() {
      let temp_dir = TempDir::new().unwrap();
      let context = DirectoryContext::under(temp_dir.path());
      std::fs::create_dir_all(context.bundle_dir().join("www")).unwrap();
      std::fs::write(context.bundle_dir().join("www/app.db"), b"seed").unwrap();

      let mut contents = Vec::new();
      context
         .open_bundle_asset("www/app.db")
         .unwrap()
         .read_to_end(&mut contents)
         .unwrap();

      assert_eq!(contents, b"seed");
   }

   #[test]
   fn test_rejects_escaping_paths() {
      let temp_dir = TempDir::new().unwrap();
      let context = DirectoryContext::under(temp_dir.path());

      for path in ["../secret.db", "/etc/passwd", "www/../../x.db"] {
         let err = context.open_bundle_asset(path).err().unwrap();
         assert_eq!(err.kind(), io::ErrorKind::InvalidInput, "{path}");
      }
   }

   #[test]
   fn test_missing_asset_is_not_found() {
      let temp_dir = TempDir::new().unwrap();
      let context = DirectoryContext::under(temp_dir.path());

      let err = context.open_bundle_asset("www/none.db").err().unwrap();
      assert_eq!(err.kind(), io::ErrorKind::NotFound);
   }

   #[test]
   fn test_database_path_under_databases_dir() {
      let context = DirectoryContext::new("/b", "/f", "/d");
      assert_eq!(context.database_path("app.db"), PathBuf::from("/d/app.db"));
      assert_eq!(context.files_dir(), PathBuf::from("/f"));
   }
}
