//! Opens SQLCipher databases for a host application.
//!
//! A database is named by a plain file name and lives at the host's standard
//! database path. On first use it can be seeded from a pre-populated asset in the
//! app bundle or the app's files directory. [`DatabaseOpener::open_with_encryption`]
//! opens a database with a passphrase and, when it finds the file still in
//! plaintext, encrypts it in place first.
//!
//! ```no_run
//! use sqlcipher_storage::{AssetRef, DatabaseOpener, DirectoryContext, OpenFlags, OpenedDatabases};
//!
//! # async fn example() -> sqlcipher_storage::Result<()> {
//! let databases = OpenedDatabases::new(DatabaseOpener::new(DirectoryContext::under("/data/app")));
//!
//! let asset = AssetRef::parse(Some("1"));
//! let db = databases
//!    .open("app.db", Some("passphrase"), asset.as_ref(), OpenFlags::ReadWrite)
//!    .await?;
//!
//! sqlx::query("SELECT 1").execute(db.read_pool()?).await?;
//!
//! databases.close_all().await?;
//! # Ok(())
//! # }
//! ```

mod asset;
mod config;
mod context;
mod error;
mod flags;
mod instances;
mod opener;
mod resolve;

pub use asset::{AssetRef, DEFAULT_BUNDLE_SENTINEL, HOME_MARKER};
pub use config::OpenerConfig;
pub use context::{DirectoryContext, HostContext};
pub use error::{Error, Result};
pub use flags::OpenFlags;
pub use instances::OpenedDatabases;
pub use opener::{DatabaseOpener, OpenOutcome};
pub use resolve::resolve_database_file;
pub use sqlx_sqlcipher_conn_mgr::{SqliteDatabase, SqliteDatabaseConfig, WriteGuard};
