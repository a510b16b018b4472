//! Core value types shared across the sync pipeline.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Locale suffix of a bundle file (e.g. `de_AT`), kept as one opaque string.
///
/// The empty string is a distinguished value meaning "the fallback bundle
/// with no locale suffix".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Language(String);

impl Language {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The fallback language (no locale suffix).
    #[must_use]
    pub fn fallback() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sort rank: fallback first, then `_`-prefixed sentinels, then
    /// `<`-prefixed markers, then everything else in natural order.
    fn rank(&self) -> u8 {
        if self.0.is_empty() {
            0
        } else if self.0.starts_with('_') {
            1
        } else if self.0.starts_with('<') {
            2
        } else {
            3
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for Language {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Language {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One translated value for one language.
///
/// The ordering (language first, then value) only exists to give stable,
/// human-friendly iteration order; storage does not depend on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Translation {
    language: Language,
    value: String,
}

impl Translation {
    #[must_use]
    pub fn new(language: Language, value: impl Into<String>) -> Self {
        Self { language, value: value.into() }
    }

    #[must_use]
    pub fn language(&self) -> &Language {
        &self.language
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Identity of a single translatable string: logical bundle name plus
/// property key. Unique per row in the tabular store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleKey {
    bundle: String,
    key: String,
}

impl BundleKey {
    #[must_use]
    pub fn new(bundle: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bundle: bundle.into(), key: key.into() }
    }

    /// The `/`-joined logical bundle path, e.g. `widgets/buttons`.
    #[must_use]
    pub fn bundle(&self) -> &str {
        &self.bundle
    }

    /// The property key. May be the empty string.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for BundleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.bundle, self.key)
    }
}

/// Character encoding used when reading and writing property files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Charset {
    #[default]
    Utf8,
    /// ISO-8859-1, the historical encoding of the properties format.
    /// Characters outside Latin-1 are written as `\uXXXX` escapes.
    Latin1,
}

#[derive(Debug, thiserror::Error)]
pub enum CharsetError {
    #[error("Invalid UTF-8 sequence at byte {valid_up_to}")]
    InvalidUtf8 { valid_up_to: usize },
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown charset '{0}' (expected 'utf-8' or 'iso-8859-1')")]
pub struct CharsetParseError(String);

impl Charset {
    /// # Errors
    /// Invalid UTF-8 input when decoding as [`Charset::Utf8`]. Latin-1
    /// decoding cannot fail.
    pub fn decode(self, bytes: &[u8]) -> Result<String, CharsetError> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| {
                CharsetError::InvalidUtf8 { valid_up_to: e.utf8_error().valid_up_to() }
            }),
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Encodes text for writing. Latin-1 output escapes every character
    /// above U+00FF as `\uXXXX` (surrogate pairs for astral characters),
    /// so encoding never fails.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => {
                let mut out = Vec::with_capacity(text.len());
                let mut units = [0u16; 2];
                for c in text.chars() {
                    if u32::from(c) <= 0xFF {
                        out.push(u32::from(c) as u8);
                    } else {
                        for unit in c.encode_utf16(&mut units) {
                            out.extend_from_slice(format!("\\u{unit:04X}").as_bytes());
                        }
                    }
                }
                out
            },
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utf8 => f.write_str("utf-8"),
            Self::Latin1 => f.write_str("iso-8859-1"),
        }
    }
}

impl FromStr for Charset {
    type Err = CharsetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Ok(Self::Latin1),
            other => Err(CharsetParseError(other.to_string())),
        }
    }
}
