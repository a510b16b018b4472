//! Grid serialization strategies.
//!
//! The tabular store is format-agnostic: a [`GridCodec`] turns a file into a
//! [`Grid`] and back. The codec is picked once, from the store path
//! extension, when the store is opened.

use std::io::Write;
use std::path::{
    Path,
    PathBuf,
};

use serde::{
    Deserialize,
    Serialize,
};

/// Cell matrix plus the informational generation metadata. Row 0 is the
/// header. `None` marks a structurally absent ("phantom") cell, which is
/// distinct from a present empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grid {
    #[serde(default)]
    pub metadata: GridMetadata,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Generation metadata, rewritten on every save. Purely informational: the
/// importer never reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridMetadata {
    pub generated_at: Option<String>,
    pub generated_by: Option<String>,
    pub user: Option<String>,
}

impl GridMetadata {
    pub(crate) fn refresh(&mut self) {
        self.generated_at = Some(jiff::Timestamp::now().to_string());
        self.generated_by =
            Some(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string());
        self.user =
            std::env::var("USER").or_else(|_| std::env::var("USERNAME")).ok();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unsupported store format for {0} (expected a .csv or .json extension)")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to access store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse CSV store: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to parse JSON store: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to persist store: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Strategy for reading and writing one grid file format.
pub trait GridCodec: std::fmt::Debug {
    /// Parses the backing file into a grid.
    ///
    /// # Errors
    /// Unreadable or malformed input.
    fn read(&self, path: &Path) -> Result<Grid, StoreError>;

    /// Serializes the grid.
    ///
    /// # Errors
    /// Any write failure.
    fn write(&self, grid: &Grid, writer: &mut dyn Write) -> Result<(), StoreError>;
}

/// Selects the codec for a store path, once, at construction time.
///
/// # Errors
/// Unknown extension; a configuration error.
pub fn codec_for_path(path: &Path) -> Result<Box<dyn GridCodec>, StoreError> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("csv") => Ok(Box::new(CsvCodec)),
        Some("json") => Ok(Box::new(JsonCodec)),
        _ => Err(StoreError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// CSV backend. Carries no metadata section (the format has no second
/// sheet) and reads empty fields as absent cells.
#[derive(Debug, Clone, Copy)]
pub struct CsvCodec;

impl GridCodec for CsvCodec {
    fn read(&self, path: &Path) -> Result<Grid, StoreError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }
        Ok(Grid { metadata: GridMetadata::default(), rows })
    }

    fn write(&self, grid: &Grid, writer: &mut dyn Write) -> Result<(), StoreError> {
        let mut out = csv::WriterBuilder::new().flexible(true).from_writer(writer);
        for row in &grid.rows {
            out.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        out.flush()?;
        Ok(())
    }
}

/// JSON backend. Full fidelity: keeps the metadata section and
/// distinguishes absent cells (`null`) from empty strings.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec;

impl GridCodec for JsonCodec {
    fn read(&self, path: &Path) -> Result<Grid, StoreError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, grid: &Grid, writer: &mut dyn Write) -> Result<(), StoreError> {
        serde_json::to_writer_pretty(&mut *writer, grid)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
