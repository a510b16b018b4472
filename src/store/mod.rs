//! The persistent tabular store: a grid of translations addressed by
//! (bundle, key) rows and language columns.

mod codec;

use std::collections::{
    BTreeMap,
    HashMap,
};
use std::path::{
    Path,
    PathBuf,
};

pub use codec::{
    CsvCodec,
    Grid,
    GridCodec,
    GridMetadata,
    JsonCodec,
    StoreError,
    codec_for_path,
};
use tempfile::NamedTempFile;

use crate::report::SyncReporter;
use crate::types::{
    BundleKey,
    Language,
    Translation,
};

/// Header title of the fixed bundle name column (column 0).
pub const BUNDLE_COLUMN_HEADER: &str = "Bundle Basename";
/// Header title of the fixed property key column (column 1).
pub const KEY_COLUMN_HEADER: &str = "I18n Key";
/// Literal header cell marking the column of the empty (fallback) language,
/// so round-tripping distinguishes "no locale" from "column not created".
pub const FALLBACK_COLUMN_HEADER: &str = "<default>";

/// Index of the first language column.
const FIRST_LANGUAGE_COLUMN: usize = 2;

/// Grid plus two derived bidirectional indexes: Language <-> column and
/// BundleKey <-> row. The indexes grow through the append accessors and are
/// never shrunk; the grid is only ever mutated through those accessors.
#[derive(Debug)]
pub struct TabularStore {
    path: PathBuf,
    codec: Box<dyn GridCodec>,
    grid: Grid,
    column_index: HashMap<Language, usize>,
    column_language: BTreeMap<usize, Language>,
    row_index: HashMap<BundleKey, usize>,
}

impl TabularStore {
    /// Opens an existing store or starts a fresh one with only the header
    /// row. Rebuilds the row/column indexes from the header and from
    /// columns 0/1 of every data row; unreadable rows are skipped and
    /// duplicate language columns or bundle-key rows keep their first
    /// occurrence, each with a warning.
    ///
    /// # Errors
    /// Unsupported store extension, or an existing file that cannot be
    /// read or parsed.
    pub fn open(path: &Path, reporter: &dyn SyncReporter) -> Result<Self, StoreError> {
        let codec = codec_for_path(path)?;
        let grid = if path.exists() {
            codec.read(path)?
        } else {
            Grid {
                metadata: GridMetadata::default(),
                rows: vec![vec![
                    Some(BUNDLE_COLUMN_HEADER.to_string()),
                    Some(KEY_COLUMN_HEADER.to_string()),
                ]],
            }
        };

        let mut store = Self {
            path: path.to_path_buf(),
            codec,
            grid,
            column_index: HashMap::new(),
            column_language: BTreeMap::new(),
            row_index: HashMap::new(),
        };
        store.ensure_header();
        store.rebuild_indexes(reporter);
        Ok(store)
    }

    fn ensure_header(&mut self) {
        if self.grid.rows.is_empty() {
            self.grid.rows.push(Vec::new());
        }
        if let Some(header) = self.grid.rows.first_mut() {
            if header.is_empty() {
                header.push(Some(BUNDLE_COLUMN_HEADER.to_string()));
            }
            if header.len() < FIRST_LANGUAGE_COLUMN {
                header.push(Some(KEY_COLUMN_HEADER.to_string()));
            }
        }
    }

    fn rebuild_indexes(&mut self, reporter: &dyn SyncReporter) {
        if let Some(header) = self.grid.rows.first() {
            for (column, cell) in header.iter().enumerate().skip(FIRST_LANGUAGE_COLUMN) {
                let Some(title) = cell else {
                    reporter.warning(&format!(
                        "Store {}: language column {column} has no header, ignoring it",
                        self.path.display()
                    ));
                    continue;
                };
                let language = if title == FALLBACK_COLUMN_HEADER {
                    Language::fallback()
                } else {
                    Language::new(title.as_str())
                };
                if self.column_index.contains_key(&language) {
                    reporter.warning(&format!(
                        "Store {}: duplicate column for language '{language}', \
                         keeping the first occurrence",
                        self.path.display()
                    ));
                    continue;
                }
                self.column_index.insert(language.clone(), column);
                self.column_language.insert(column, language);
            }
        }

        for (row, cells) in self.grid.rows.iter().enumerate().skip(1) {
            let Some(Some(bundle)) = cells.first() else {
                reporter.warning(&format!(
                    "Store {}: row {row} has no bundle name, skipping it",
                    self.path.display()
                ));
                continue;
            };
            // An absent key cell is read as the empty key; empty keys are
            // legal and must survive the round trip.
            let key = match cells.get(1) {
                Some(Some(key)) => key.as_str(),
                _ => "",
            };

            let bundle_key = BundleKey::new(bundle.as_str(), key);
            if self.row_index.contains_key(&bundle_key) {
                reporter.warning(&format!(
                    "Store {}: duplicate row for '{bundle_key}', keeping the first occurrence",
                    self.path.display()
                ));
                continue;
            }
            self.row_index.insert(bundle_key, row);
        }
    }

    /// Writes one cell, appending the row and/or column on demand.
    /// Idempotent: repeating the call with the same arguments leaves the
    /// grid unchanged.
    pub fn set_value(&mut self, key: &BundleKey, language: &Language, value: &str) {
        let row = match self.row_index.get(key) {
            Some(&row) => row,
            None => self.append_row(key),
        };
        let column = match self.column_index.get(language) {
            Some(&column) => column,
            None => self.append_column(language),
        };

        let Some(cells) = self.grid.rows.get_mut(row) else {
            return;
        };
        if cells.len() <= column {
            cells.resize(column + 1, None);
        }
        if let Some(cell) = cells.get_mut(column) {
            *cell = Some(value.to_string());
        }
    }

    /// Looks up one cell.
    #[must_use]
    pub fn value(&self, key: &BundleKey, language: &Language) -> Option<&str> {
        let row = *self.row_index.get(key)?;
        let column = *self.column_index.get(language)?;
        self.grid.rows.get(row)?.get(column)?.as_deref()
    }

    /// Extracts the full content: every non-absent cell across each row's
    /// known language columns. Phantom cells left behind by third-party
    /// writers are skipped rather than turned into empty translations.
    #[must_use]
    pub fn get_content(&self) -> BTreeMap<BundleKey, Vec<Translation>> {
        let mut content = BTreeMap::new();
        for (key, &row) in &self.row_index {
            let Some(cells) = self.grid.rows.get(row) else {
                continue;
            };
            let mut translations = Vec::new();
            for (&column, language) in &self.column_language {
                if let Some(Some(value)) = cells.get(column) {
                    translations.push(Translation::new(language.clone(), value.as_str()));
                }
            }
            translations.sort();
            content.insert(key.clone(), translations);
        }
        content
    }

    #[must_use]
    pub fn language_count(&self) -> usize {
        self.column_index.len()
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.row_index.len()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists the grid to its backing file.
    ///
    /// # Errors
    /// Any serialization or I/O failure; the original file is only replaced
    /// after a fully successful write.
    pub fn save(&mut self) -> Result<(), StoreError> {
        let path = self.path.clone();
        self.save_to(&path)
    }

    /// Persists the grid to an explicit path, atomically: the grid is
    /// written to a temporary file in the destination directory which then
    /// replaces the target, so an interrupted save never leaves a
    /// half-written store in place of the original.
    ///
    /// # Errors
    /// Any serialization or I/O failure.
    pub fn save_to(&mut self, path: &Path) -> Result<(), StoreError> {
        self.grid.metadata.refresh();

        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(directory)?;
        self.codec.write(&self.grid, temp.as_file_mut())?;
        temp.persist(path)?;

        tracing::debug!(path = %path.display(), "Store saved");
        Ok(())
    }

    /// Appends a data row for a key, filling the two fixed columns.
    fn append_row(&mut self, key: &BundleKey) -> usize {
        let row = self.grid.rows.len();
        self.grid
            .rows
            .push(vec![Some(key.bundle().to_string()), Some(key.key().to_string())]);
        self.row_index.insert(key.clone(), row);
        row
    }

    /// Appends a language column, writing its header cell. The two column
    /// maps only change here and in `rebuild_indexes`, which keeps them in
    /// sync by construction.
    fn append_column(&mut self, language: &Language) -> usize {
        let column = self
            .grid
            .rows
            .first()
            .map_or(FIRST_LANGUAGE_COLUMN, |header| header.len().max(FIRST_LANGUAGE_COLUMN));

        if let Some(header) = self.grid.rows.first_mut() {
            if header.len() < column {
                header.resize(column, None);
            }
            let title = if language.is_fallback() {
                FALLBACK_COLUMN_HEADER.to_string()
            } else {
                language.as_str().to_string()
            };
            header.push(Some(title));
        }

        self.column_index.insert(language.clone(), column);
        self.column_language.insert(column, language.clone());
        column
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;
    use crate::report::{
        CollectingReporter,
        NullReporter,
    };

    fn key(bundle: &str, key: &str) -> BundleKey {
        BundleKey::new(bundle, key)
    }

    #[rstest]
    fn open_missing_file_starts_with_header() {
        let temp_dir = TempDir::new().unwrap();
        let store =
            TabularStore::open(&temp_dir.path().join("store.csv"), &NullReporter).unwrap();

        assert_that!(store.key_count(), eq(0));
        assert_that!(store.language_count(), eq(0));
    }

    #[rstest]
    fn open_rejects_unknown_extension() {
        let temp_dir = TempDir::new().unwrap();
        let result = TabularStore::open(&temp_dir.path().join("store.xls"), &NullReporter);

        assert_that!(result.is_err(), eq(true));
    }

    #[rstest]
    fn set_value_grows_rows_and_columns() {
        let temp_dir = TempDir::new().unwrap();
        let mut store =
            TabularStore::open(&temp_dir.path().join("store.csv"), &NullReporter).unwrap();

        store.set_value(&key("messages", "greeting"), &Language::fallback(), "Hello");
        store.set_value(&key("messages", "greeting"), &Language::new("de"), "Hallo");
        store.set_value(&key("widgets/buttons", "ok"), &Language::new("de"), "OK");

        assert_that!(store.key_count(), eq(2));
        assert_that!(store.language_count(), eq(2));
        assert_that!(
            store.value(&key("messages", "greeting"), &Language::new("de")),
            some(eq("Hallo"))
        );
    }

    #[rstest]
    fn set_value_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let mut store =
            TabularStore::open(&temp_dir.path().join("store.csv"), &NullReporter).unwrap();

        store.set_value(&key("messages", "greeting"), &Language::new("de"), "Hallo");
        let rows_before = store.grid.rows.clone();
        store.set_value(&key("messages", "greeting"), &Language::new("de"), "Hallo");

        assert_that!(store.grid.rows, eq(&rows_before));
    }

    #[rstest]
    fn save_and_reopen_round_trips_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.csv");

        let mut store = TabularStore::open(&path, &NullReporter).unwrap();
        store.set_value(&key("messages", "greeting"), &Language::fallback(), "Hello");
        store.set_value(&key("messages", "greeting"), &Language::new("de"), "Hallo");
        store.save().unwrap();

        let reopened = TabularStore::open(&path, &NullReporter).unwrap();
        let content = reopened.get_content();
        let translations = &content[&key("messages", "greeting")];

        assert_that!(translations.len(), eq(2));
        assert_that!(translations[0].language().is_fallback(), eq(true));
        assert_that!(translations[0].value(), eq("Hello"));
        assert_that!(translations[1].language().as_str(), eq("de"));
        assert_that!(translations[1].value(), eq("Hallo"));
    }

    #[rstest]
    fn fallback_language_column_uses_sentinel_header() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.csv");

        let mut store = TabularStore::open(&path, &NullReporter).unwrap();
        store.set_value(&key("messages", "greeting"), &Language::fallback(), "Hello");
        store.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_that!(header, contains_substring(FALLBACK_COLUMN_HEADER));
    }

    #[rstest]
    fn get_content_skips_phantom_cells() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let grid = Grid {
            metadata: GridMetadata::default(),
            rows: vec![
                vec![
                    Some(BUNDLE_COLUMN_HEADER.to_string()),
                    Some(KEY_COLUMN_HEADER.to_string()),
                    Some("de".to_string()),
                    Some("fr".to_string()),
                ],
                vec![
                    Some("messages".to_string()),
                    Some("greeting".to_string()),
                    Some("Hallo".to_string()),
                    None,
                ],
            ],
        };
        let mut buffer = Vec::new();
        JsonCodec.write(&grid, &mut buffer).unwrap();
        std::fs::write(&path, &buffer).unwrap();

        let store = TabularStore::open(&path, &NullReporter).unwrap();
        let content = store.get_content();
        let translations = &content[&key("messages", "greeting")];

        assert_that!(translations.len(), eq(1));
        assert_that!(translations[0].language().as_str(), eq("de"));
    }

    #[rstest]
    fn open_warns_on_duplicate_columns_and_rows() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let grid = Grid {
            metadata: GridMetadata::default(),
            rows: vec![
                vec![
                    Some(BUNDLE_COLUMN_HEADER.to_string()),
                    Some(KEY_COLUMN_HEADER.to_string()),
                    Some("de".to_string()),
                    Some("de".to_string()),
                ],
                vec![
                    Some("messages".to_string()),
                    Some("greeting".to_string()),
                    Some("Hallo".to_string()),
                    Some("Servus".to_string()),
                ],
                vec![
                    Some("messages".to_string()),
                    Some("greeting".to_string()),
                    Some("Moin".to_string()),
                    None,
                ],
            ],
        };
        let mut buffer = Vec::new();
        JsonCodec.write(&grid, &mut buffer).unwrap();
        std::fs::write(&path, &buffer).unwrap();

        let reporter = CollectingReporter::new();
        let store = TabularStore::open(&path, &reporter).unwrap();

        assert_that!(store.language_count(), eq(1));
        assert_that!(store.key_count(), eq(1));
        assert_that!(
            reporter.warnings(),
            elements_are![
                contains_substring("duplicate column"),
                contains_substring("duplicate row")
            ]
        );
        assert_that!(
            store.value(&key("messages", "greeting"), &Language::new("de")),
            some(eq("Hallo"))
        );
    }

    #[rstest]
    fn empty_key_rows_are_kept() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.csv");

        let mut store = TabularStore::open(&path, &NullReporter).unwrap();
        store.set_value(&key("messages", ""), &Language::new("de"), "leer");
        store.save().unwrap();

        let reopened = TabularStore::open(&path, &NullReporter).unwrap();
        assert_that!(
            reopened.value(&key("messages", ""), &Language::new("de")),
            some(eq("leer"))
        );
    }
}
