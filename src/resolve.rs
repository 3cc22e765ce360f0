use std::fs::{File, create_dir_all};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::context::stays_inside;
use crate::{AssetRef, Error, HostContext, OpenFlags, OpenerConfig, Result};

/// Work out which file backs database `name`, seeding it from `asset` on first use.
///
/// Resolution order:
/// 1. [`AssetRef::DefaultBundle`]: read `<bundle_subdir>/<name>` from the bundle.
/// 2. [`AssetRef::BundleSubpath`]: read that path from the bundle.
/// 3. [`AssetRef::ExternalFile`]: read that path under the files directory, which
///    it may not leave. A read-only open returns the external file itself;
///    nothing is copied.
/// 4. Otherwise the file is `context.database_path(name)`. If it does not exist
///    yet and an asset was opened, the asset is copied there. If it still does
///    not exist, its parent directory is created for the engine to create it.
///
/// A missing asset is an error. A failed copy is logged and otherwise ignored,
/// and never leaves a partially written database behind.
pub fn resolve_database_file<C: HostContext + ?Sized>(
   context: &C,
   config: &OpenerConfig,
   name: &str,
   flags: OpenFlags,
   asset: Option<&AssetRef>,
) -> Result<PathBuf> {
   validate_database_name(name)?;

   let seed = match asset {
      None => None,
      Some(AssetRef::DefaultBundle) => {
         let bundle_path = AssetRef::default_bundle_path(&config.bundle_subdir, name);
         let reader = open_bundle_asset(context, &bundle_path)?;
         debug!("Located pre-populated database in bundle subdirectory: {}", bundle_path);
         Some(reader)
      }
      Some(AssetRef::BundleSubpath(bundle_path)) => {
         let reader = open_bundle_asset(context, bundle_path)?;
         debug!("Located pre-populated database in bundle: {}", bundle_path);
         Some(reader)
      }
      Some(AssetRef::ExternalFile(relative)) => {
         if !stays_inside(Path::new(relative)) {
            return Err(Error::InvalidPath(format!(
               "asset path escapes the files directory: {}",
               relative
            )));
         }

         let asset_file = context.files_dir().join(relative);
         let reader = open_external_asset(&asset_file)?;
         debug!("Located pre-populated database in files directory: {}", asset_file.display());

         if flags.is_read_only() {
            debug!("Read-only open, serving external asset in place");
            return Ok(asset_file);
         }

         Some(reader)
      }
   };

   let db_file = context.database_path(name);

   if !db_file.exists()
      && let Some(reader) = seed
   {
      seed_from_asset(&db_file, reader, config.copy_buffer_size);
   }

   if !db_file.exists()
      && let Some(parent) = db_file.parent()
   {
      create_dir_all(parent)?;
   }

   Ok(db_file)
}

/// Database names are file names, never paths.
pub(crate) fn validate_database_name(name: &str) -> Result<()> {
   if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
      return Err(Error::InvalidPath(format!(
         "database name must be a plain file name: {:?}",
         name
      )));
   }
   Ok(())
}

fn open_bundle_asset<C: HostContext + ?Sized>(
   context: &C,
   bundle_path: &str,
) -> Result<Box<dyn Read + Send>> {
   context
      .open_bundle_asset(bundle_path)
      .map_err(|e| asset_error(e, bundle_path))
}

fn open_external_asset(asset_file: &Path) -> Result<Box<dyn Read + Send>> {
   let file = File::open(asset_file).map_err(|e| asset_error(e, &asset_file.display().to_string()))?;
   Ok(Box::new(file))
}

fn asset_error(err: io::Error, path: &str) -> Error {
   if err.kind() == io::ErrorKind::NotFound {
      Error::AssetNotFound(path.to_string())
   } else {
      Error::Io(err)
   }
}

/// Copy the asset to `db_file`, logging instead of failing.
fn seed_from_asset(db_file: &Path, reader: Box<dyn Read + Send>, buffer_size: usize) {
   debug!("Copying pre-populated database to {}", db_file.display());

   match copy_asset(db_file, reader, buffer_size) {
      Ok(bytes) => info!(
         "Copied {} bytes of pre-populated database content to {}",
         bytes,
         db_file.display()
      ),
      Err(e) => warn!("No pre-populated database copied to {}: {}", db_file.display(), e),
   }
}

/// Stage the copy next to `db_file` and rename it into place once complete.
///
/// The staging file is deleted on every error path, so `db_file` either holds the
/// whole asset or does not exist.
fn copy_asset(db_file: &Path, reader: Box<dyn Read + Send>, buffer_size: usize) -> io::Result<u64> {
   let dir = match db_file.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent,
      _ => Path::new("."),
   };
   create_dir_all(dir)?;

   let staging = tempfile::Builder::new()
      .prefix(".seed")
      .tempfile_in(dir)?;

   let buffer_size = buffer_size.max(1);
   let mut reader = BufReader::with_capacity(buffer_size, reader);
   let mut writer = BufWriter::with_capacity(buffer_size, staging);

   let bytes = io::copy(&mut reader, &mut writer)?;

   let staging = writer.into_inner().map_err(|e| e.into_error())?;
   staging.as_file().sync_all()?;
   staging.persist_noclobber(db_file).map_err(|e| e.error)?;

   Ok(bytes)
}
