//! In-memory aggregate of one resource bundle across all of its languages.

use std::collections::BTreeMap;
use std::path::{
    Path,
    PathBuf,
};

use indexmap::IndexMap;

use crate::properties::{
    PropertiesError,
    PropertiesFile,
};
use crate::types::{
    Charset,
    Language,
    Translation,
};

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("Failed to load bundle file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: PropertiesError,
    },
}

/// Multimap from property key to its translations, one per language.
///
/// Keys iterate in first-seen (file) order; translations per key iterate in
/// [`Language`] order. Built once per bundle during an export pass.
#[derive(Debug, Clone)]
pub struct BundleContent {
    name: String,
    content: IndexMap<String, BTreeMap<Language, String>>,
}

impl BundleContent {
    /// Creates an empty content holder for a bundle.
    #[must_use]
    pub fn for_name(name: impl Into<String>) -> Self {
        Self { name: name.into(), content: IndexMap::new() }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Loads every file of the bundle and returns a **new** content holder;
    /// the receiver is left untouched. Keys are taken verbatim, including
    /// the empty key.
    ///
    /// # Errors
    /// An unreadable or undecodable file aborts loading for the whole
    /// bundle; no partial bundle is returned.
    pub fn from_files(
        &self,
        files: &BTreeMap<Language, PathBuf>,
        charset: Charset,
    ) -> Result<Self, BundleError> {
        let mut next = self.clone();
        for (language, path) in files {
            next.load_file(language, path, charset)?;
        }
        Ok(next)
    }

    fn load_file(
        &mut self,
        language: &Language,
        path: &Path,
        charset: Charset,
    ) -> Result<(), BundleError> {
        let file = PropertiesFile::load(path, charset)
            .map_err(|source| BundleError::Load { path: path.to_path_buf(), source })?;

        for key in file.keys() {
            if let Some(value) = file.get(key) {
                self.add_translation(key, Translation::new(language.clone(), value));
            }
        }
        Ok(())
    }

    /// Appends one translation. A second translation for the same
    /// (key, language) pair is dropped; the first one wins.
    pub fn add_translation(&mut self, key: &str, translation: Translation) {
        let translations = self.content.entry(key.to_string()).or_default();
        if translations.contains_key(translation.language()) {
            tracing::warn!(
                bundle = %self.name,
                key,
                language = %translation.language(),
                "Duplicate translation, keeping the first occurrence"
            );
            return;
        }
        translations.insert(translation.language().clone(), translation.value().to_string());
    }

    /// (key, language -> value) pairs in key file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<Language, String>)> {
        self.content.iter().map(|(key, translations)| (key.as_str(), translations))
    }

    #[must_use]
    pub fn translations(&self, key: &str) -> Option<&BTreeMap<Language, String>> {
        self.content.get(key)
    }

    /// Number of distinct property keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::fs;

    use googletest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[rstest]
    fn from_files_merges_languages_per_key() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = BTreeMap::new();
        files.insert(
            Language::fallback(),
            write_file(temp_dir.path(), "messages.properties", "greeting=Hello\nbye=Bye\n"),
        );
        files.insert(
            Language::new("de"),
            write_file(temp_dir.path(), "messages_de.properties", "greeting=Hallo\n"),
        );

        let content =
            BundleContent::for_name("messages").from_files(&files, Charset::Utf8).unwrap();

        assert_that!(content.len(), eq(2));
        let greeting = content.translations("greeting").unwrap();
        assert_that!(greeting.len(), eq(2));
        assert_that!(greeting[&Language::fallback()].as_str(), eq("Hello"));
        assert_that!(greeting[&Language::new("de")].as_str(), eq("Hallo"));
        assert_that!(content.translations("bye").unwrap().len(), eq(1));
    }

    #[rstest]
    fn from_files_leaves_the_receiver_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = BTreeMap::new();
        files.insert(
            Language::fallback(),
            write_file(temp_dir.path(), "messages.properties", "greeting=Hello\n"),
        );

        let empty = BundleContent::for_name("messages");
        let loaded = empty.from_files(&files, Charset::Utf8).unwrap();

        assert_that!(empty.is_empty(), eq(true));
        assert_that!(loaded.len(), eq(1));
    }

    #[rstest]
    fn from_files_keeps_key_file_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = BTreeMap::new();
        files.insert(
            Language::fallback(),
            write_file(temp_dir.path(), "messages.properties", "zulu=1\nalpha=2\nmike=3\n"),
        );

        let content =
            BundleContent::for_name("messages").from_files(&files, Charset::Utf8).unwrap();

        let keys: Vec<&str> = content.iter().map(|(key, _)| key).collect();
        assert_that!(keys, elements_are![eq(&"zulu"), eq(&"alpha"), eq(&"mike")]);
    }

    #[rstest]
    fn from_files_preserves_the_empty_key() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = BTreeMap::new();
        files.insert(
            Language::fallback(),
            write_file(temp_dir.path(), "messages.properties", "=anonymous\n"),
        );

        let content =
            BundleContent::for_name("messages").from_files(&files, Charset::Utf8).unwrap();

        assert_that!(content.translations("").is_some(), eq(true));
    }

    #[rstest]
    fn from_files_fails_on_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut files = BTreeMap::new();
        files.insert(Language::fallback(), temp_dir.path().join("missing.properties"));

        let result = BundleContent::for_name("messages").from_files(&files, Charset::Utf8);

        assert_that!(result.is_err(), eq(true));
    }

    #[rstest]
    fn add_translation_keeps_the_first_value() {
        let mut content = BundleContent::for_name("messages");
        content.add_translation("greeting", Translation::new(Language::new("de"), "Hallo"));
        content.add_translation("greeting", Translation::new(Language::new("de"), "Servus"));

        assert_that!(
            content.translations("greeting").unwrap()[&Language::new("de")].as_str(),
            eq("Hallo")
        );
    }
}
