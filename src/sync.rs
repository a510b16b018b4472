//! Export/import driver between property files and the tabular store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use crate::bundle::{
    BundleContent,
    BundleError,
};
use crate::matcher::{
    FileMatcher,
    MatcherError,
};
use crate::properties::{
    PropertiesError,
    PropertiesFile,
};
use crate::report::SyncReporter;
use crate::resolver::{
    BundleNameResolver,
    ResolverError,
};
use crate::store::{
    StoreError,
    TabularStore,
};
use crate::types::{
    BundleKey,
    Charset,
    Language,
};

/// Policy for keys that exist on disk but are missing from the imported
/// store content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MissingKeyAction {
    /// Leave the on-disk entry untouched.
    #[default]
    Nothing,
    /// Remove the entry entirely.
    Delete,
    /// Turn the entry into a comment, keeping its last value recoverable.
    Comment,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Matcher(#[from] MatcherError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error("No bundle files matched the configured patterns under {0}")]
    NoFilesMatched(PathBuf),

    #[error("Store file does not exist: {0}")]
    StoreNotFound(PathBuf),
}

impl SyncError {
    /// True for errors a user fixes in the invocation rather than in the
    /// data: bad patterns, bad root, unsupported store extension.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Matcher(_)
                | Self::Resolver(_)
                | Self::NoFilesMatched(_)
                | Self::Store(StoreError::UnsupportedFormat(_))
        )
    }
}

/// What an export pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub bundles: usize,
    pub keys: usize,
    pub cells: usize,
    pub languages: usize,
}

/// What an import pass did. `failed_files` lists per-file failures that did
/// not stop the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub files_written: usize,
    pub files_unchanged: usize,
    pub keys_applied: usize,
    pub failed_files: Vec<PathBuf>,
}

/// Orchestrates matcher, resolver, bundle loading and the tabular store.
///
/// Warnings for recovered anomalies go through the [`SyncReporter`] given at
/// construction; the engine itself keeps no global state.
#[derive(Debug)]
pub struct SyncEngine<R: SyncReporter> {
    reporter: R,
}

impl<R: SyncReporter> SyncEngine<R> {
    #[must_use]
    pub fn new(reporter: R) -> Self {
        Self { reporter }
    }

    /// Exports every matched bundle file under `root` into the store at
    /// `store_path`, creating the store when it does not exist yet.
    ///
    /// Bundles, keys and languages are visited in deterministic order, so
    /// re-exporting unchanged input reproduces the same grid.
    ///
    /// # Errors
    /// Configuration errors (patterns, root, store extension, zero matched
    /// files) and any unreadable bundle file or store I/O failure; the
    /// store is the single shared target, so the whole run aborts.
    pub fn export(
        &self,
        root: &Path,
        includes: &[String],
        excludes: &[String],
        charset: Charset,
        store_path: &Path,
    ) -> Result<ExportSummary, SyncError> {
        let matcher = FileMatcher::new(root, includes, excludes)?;
        let files = matcher.find_files();
        if files.is_empty() {
            return Err(SyncError::NoFilesMatched(root.to_path_buf()));
        }
        tracing::debug!(count = files.len(), "Matched bundle files");

        let resolver = BundleNameResolver::new(root)?;
        let bundles = resolver.group(&files, &self.reporter)?;

        let mut store = TabularStore::open(store_path, &self.reporter)?;
        let mut summary = ExportSummary { bundles: bundles.len(), ..ExportSummary::default() };

        for (bundle_name, language_files) in &bundles {
            let content =
                BundleContent::for_name(bundle_name.as_str()).from_files(language_files, charset)?;
            summary.keys += content.len();

            for (key, translations) in content.iter() {
                let bundle_key = BundleKey::new(bundle_name.as_str(), key);
                for (language, value) in translations {
                    store.set_value(&bundle_key, language, value);
                    summary.cells += 1;
                }
            }
        }

        store.save()?;
        summary.languages = store.language_count();
        Ok(summary)
    }

    /// Imports the store at `store_path` back into property files under
    /// `root`, applying `action` to on-disk keys absent from the store.
    ///
    /// Only files whose content actually changed are rewritten, and a file
    /// that would end up with zero entries is never created. A file that
    /// cannot be parsed or written aborts only itself and is recorded in
    /// the summary.
    ///
    /// # Errors
    /// An unreadable or unparseable store; per-file failures do not abort
    /// the batch.
    pub fn import(
        &self,
        root: &Path,
        store_path: &Path,
        charset: Charset,
        action: MissingKeyAction,
    ) -> Result<ImportSummary, SyncError> {
        if !store_path.exists() {
            return Err(SyncError::StoreNotFound(store_path.to_path_buf()));
        }
        let store = TabularStore::open(store_path, &self.reporter)?;

        // Regroup rows by (bundle, language): one group per target file.
        let mut groups: BTreeMap<(String, Language), BTreeMap<String, String>> = BTreeMap::new();
        for (bundle_key, translations) in store.get_content() {
            for translation in translations {
                groups
                    .entry((bundle_key.bundle().to_string(), translation.language().clone()))
                    .or_default()
                    .insert(bundle_key.key().to_string(), translation.value().to_string());
            }
        }

        let mut summary = ImportSummary::default();
        for ((bundle_name, language), entries) in &groups {
            let path = target_file(root, bundle_name, language);
            match self.import_file(&path, entries, charset, action) {
                Ok(FileOutcome::Written) => {
                    summary.files_written += 1;
                    summary.keys_applied += entries.len();
                },
                Ok(FileOutcome::Unchanged) => {
                    summary.files_unchanged += 1;
                    summary.keys_applied += entries.len();
                },
                Err(error) => {
                    self.reporter.warning(&format!("Import failed for {}: {error}", path.display()));
                    summary.failed_files.push(path);
                },
            }
        }
        Ok(summary)
    }

    fn import_file(
        &self,
        path: &Path,
        entries: &BTreeMap<String, String>,
        charset: Charset,
        action: MissingKeyAction,
    ) -> Result<FileOutcome, PropertiesError> {
        let exists = path.exists();
        let mut file =
            if exists { PropertiesFile::load(path, charset)? } else { PropertiesFile::new() };

        for (key, value) in entries {
            file.set(key, value);
        }

        let on_disk: Vec<String> = file.keys().map(str::to_string).collect();
        for key in on_disk {
            if entries.contains_key(&key) {
                continue;
            }
            match action {
                MissingKeyAction::Nothing => {},
                MissingKeyAction::Delete => {
                    file.remove(&key);
                },
                MissingKeyAction::Comment => {
                    file.comment_out(&key);
                },
            }
        }

        if !file.is_modified() {
            return Ok(FileOutcome::Unchanged);
        }
        // Never invent an empty bundle file for an untouched language.
        if !exists && file.is_empty() {
            return Ok(FileOutcome::Unchanged);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| PropertiesError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        file.store(path, charset)?;
        tracing::debug!(path = %path.display(), "Bundle file written");
        Ok(FileOutcome::Written)
    }
}

enum FileOutcome {
    Written,
    Unchanged,
}

/// `root/<bundle>[_<language>].properties`; the bundle name's `/` segments
/// become subdirectories.
fn target_file(root: &Path, bundle_name: &str, language: &Language) -> PathBuf {
    let file_name = if language.is_fallback() {
        format!("{bundle_name}.properties")
    } else {
        format!("{bundle_name}_{language}.properties")
    };
    root.join(file_name)
}
