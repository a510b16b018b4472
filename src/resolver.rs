//! Bundle name and language resolution from property file paths.
//!
//! A file name `buttons_de_AT.properties` under `<root>/widgets/` resolves
//! to the bundle `widgets/buttons` with language `de_AT`. The locale suffix
//! is kept opaque; only the overall shape
//! `<BUNDLE>(_<LANG>(_<SCRIPT>)?(_<COUNTRY>)?(_<VARIANT>)?)?.properties`
//! is matched.

use std::collections::BTreeMap;
use std::path::{
    Component,
    Path,
    PathBuf,
};

use regex::Regex;

use crate::report::SyncReporter;
use crate::types::Language;

/// Bundle base name plus the locale suffix captured as one opaque string.
const FILE_NAME_PATTERN: &str =
    r"^([A-Za-z0-9-]+)(?:_([A-Za-z]{2,8}(?:_[A-Za-z0-9]{1,8}){0,3}))?\.properties$";

#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Invalid bundle file name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("File {path} is not located under the bundle root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("Path contains a non-UTF-8 component: {0}")]
    NonUtf8Path(PathBuf),
}

/// Parses file names into (bundle base name, [`Language`]) pairs and groups
/// matched files per bundle.
#[derive(Debug, Clone)]
pub struct BundleNameResolver {
    root: PathBuf,
    pattern: Regex,
}

/// Bundle base name -> language -> file, as produced by
/// [`BundleNameResolver::group`]. `BTreeMap` keeps iteration deterministic.
pub type BundleFilesMap = BTreeMap<String, BTreeMap<Language, PathBuf>>;

impl BundleNameResolver {
    /// # Errors
    /// Never fails in practice; the pattern is a compile-time constant and
    /// the error only exists so callers need no panic path.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, ResolverError> {
        Ok(Self { root: root.into(), pattern: Regex::new(FILE_NAME_PATTERN)? })
    }

    /// Resolves one path into its full bundle name and language.
    ///
    /// Returns `Ok(None)` for a file name that does not match the bundle
    /// pattern; the caller decides how to report the skip.
    ///
    /// # Errors
    /// The path does not sit under the configured root, or a path component
    /// is not valid UTF-8. Both are fatal: a silent fallback would assign
    /// the file to the wrong bundle.
    pub fn resolve(&self, path: &Path) -> Result<Option<(String, Language)>, ResolverError> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let Some(captures) = self.pattern.captures(file_name) else {
            return Ok(None);
        };

        let bundle = &captures[1];
        let language = captures.get(2).map_or("", |m| m.as_str());

        let prefix = self.bundle_prefix(path)?;
        let full_name =
            if prefix.is_empty() { bundle.to_string() } else { format!("{prefix}/{bundle}") };

        Ok(Some((full_name, Language::new(language))))
    }

    /// Derives the `/`-joined logical path prefix from the file's parent
    /// directory relative to the root. Separators are normalized and
    /// redundant components collapse via `Path::components`.
    fn bundle_prefix(&self, path: &Path) -> Result<String, ResolverError> {
        let parent = path.parent().unwrap_or_else(|| Path::new(""));
        let relative = parent.strip_prefix(&self.root).map_err(|_| ResolverError::OutsideRoot {
            path: path.to_path_buf(),
            root: self.root.clone(),
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment
                        .to_str()
                        .ok_or_else(|| ResolverError::NonUtf8Path(path.to_path_buf()))?;
                    segments.push(segment);
                },
                Component::CurDir => {},
                _ => {
                    return Err(ResolverError::OutsideRoot {
                        path: path.to_path_buf(),
                        root: self.root.clone(),
                    });
                },
            }
        }

        Ok(segments.join("/"))
    }

    /// Groups files by full bundle name, then by language.
    ///
    /// Files whose name does not match the bundle pattern are skipped with a
    /// warning, never silently included. A second file mapping to the same
    /// (bundle, language) pair is ignored with a warning; the first one wins.
    ///
    /// # Errors
    /// Any file outside the configured root (see [`BundleNameResolver::resolve`]).
    pub fn group(
        &self,
        files: &[PathBuf],
        reporter: &dyn SyncReporter,
    ) -> Result<BundleFilesMap, ResolverError> {
        let mut bundles: BundleFilesMap = BTreeMap::new();

        for file in files {
            let Some((bundle_name, language)) = self.resolve(file)? else {
                reporter.warning(&format!(
                    "Skipping {}: file name does not match the bundle pattern",
                    file.display()
                ));
                continue;
            };

            let languages = bundles.entry(bundle_name.clone()).or_default();
            if let Some(existing) = languages.get(&language) {
                reporter.warning(&format!(
                    "Duplicate file for bundle '{bundle_name}' language '{language}': \
                     keeping {}, ignoring {}",
                    existing.display(),
                    file.display()
                ));
                continue;
            }
            languages.insert(language, file.clone());
        }

        Ok(bundles)
    }
}
