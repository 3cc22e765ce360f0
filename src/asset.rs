/// Raw value that selects the default bundle layout (`<bundle_subdir>/<name>`).
pub const DEFAULT_BUNDLE_SENTINEL: &str = "1";

/// Leading marker that selects a path inside the app bundle.
pub const HOME_MARKER: char = '~';

/// Where a pre-populated database comes from.
///
/// Built once from the host's raw string with [`AssetRef::parse`]; nothing past
/// that boundary looks at the raw string again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
   /// `<bundle_subdir>/<database name>` inside the app bundle.
   DefaultBundle,
   /// A path inside the app bundle.
   BundleSubpath(String),
   /// A path relative to the app's private files directory.
   ExternalFile(String),
}

impl AssetRef {
   /// Interpret the raw asset value passed by a host.
   ///
   /// - `None` or `""`: no asset
   /// - `"1"`: [`AssetRef::DefaultBundle`]
   /// - `"~/path"` or `"~path"`: [`AssetRef::BundleSubpath`] with the marker stripped
   /// - anything else: [`AssetRef::ExternalFile`] with one leading `/` stripped
   ///
   /// ```
   /// use sqlcipher_storage::AssetRef;
   ///
   /// assert_eq!(AssetRef::parse(Some("1")), Some(AssetRef::DefaultBundle));
   /// assert_eq!(
   ///    AssetRef::parse(Some("~/seed/app.db")),
   ///    Some(AssetRef::BundleSubpath("seed/app.db".into()))
   /// );
   /// assert_eq!(
   ///    AssetRef::parse(Some("/imports/app.db")),
   ///    Some(AssetRef::ExternalFile("imports/app.db".into()))
   /// );
   /// assert_eq!(AssetRef::parse(Some("")), None);
   /// ```
   pub fn parse(raw: Option<&str>) -> Option<Self> {
      let raw = raw.filter(|r| !r.is_empty())?;

      if raw == DEFAULT_BUNDLE_SENTINEL {
         return Some(AssetRef::DefaultBundle);
      }

      if let Some(rest) = raw.strip_prefix(HOME_MARKER) {
         let rest = rest.strip_prefix('/').unwrap_or(rest);
         return Some(AssetRef::BundleSubpath(rest.to_string()));
      }

      let rest = raw.strip_prefix('/').unwrap_or(raw);
      Some(AssetRef::ExternalFile(rest.to_string()))
   }

   /// Bundle path of the default layout for database `name`.
   pub fn default_bundle_path(bundle_subdir: &str, name: &str) -> String {
      format!("{}/{}", bundle_subdir.trim_end_matches('/'), name)
   }
}
