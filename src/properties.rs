//! Ordered key/value property file support.
//!
//! The model is line-preserving: every untouched line is written back from
//! its original text, so rewriting a file only ever changes the lines that
//! were actually edited. Keys are enumerated in file order; a key repeated
//! within one file is flattened into a single value joined with
//! [`JOIN_DELIMITER`].

use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use crate::types::{
    Charset,
    CharsetError,
};

/// Delimiter used to flatten multi-valued properties into one value string.
pub const JOIN_DELIMITER: &str = ",";

#[derive(Debug, thiserror::Error)]
pub enum PropertiesError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: CharsetError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Equals,
    Colon,
    Whitespace,
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    value: String,
    separator: Separator,
    /// Original physical line(s), kept verbatim until the entry is edited.
    raw: Option<String>,
}

impl Entry {
    fn render(&self) -> String {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }

        let key = escape_key(&self.key);
        let value = escape_value(&self.value);
        match self.separator {
            Separator::Equals => format!("{key}={value}"),
            Separator::Colon => format!("{key}:{value}"),
            Separator::Whitespace if value.is_empty() => key,
            Separator::Whitespace => format!("{key} {value}"),
        }
    }
}

#[derive(Debug, Clone)]
enum Line {
    Blank(String),
    Comment(String),
    Entry(Entry),
}

/// One property file held in memory as an ordered sequence of lines.
#[derive(Debug, Clone, Default)]
pub struct PropertiesFile {
    lines: Vec<Line>,
    modified: bool,
}

impl PropertiesFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads and decodes a file.
    ///
    /// # Errors
    /// Unreadable file or input that is not valid in the given charset; no
    /// partial content is returned.
    pub fn load(path: &Path, charset: Charset) -> Result<Self, PropertiesError> {
        let bytes = fs::read(path)
            .map_err(|source| PropertiesError::Read { path: path.to_path_buf(), source })?;
        let text = charset
            .decode(&bytes)
            .map_err(|source| PropertiesError::Decode { path: path.to_path_buf(), source })?;
        Ok(Self::parse(&text))
    }

    /// Parses property file text. Comment lines start with `#` or `!`;
    /// entries use `=`, `:` or bare whitespace as separator; a trailing
    /// backslash continues the value on the next line.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let physical: Vec<&str> = text.lines().collect();
        let mut lines: Vec<Line> = Vec::with_capacity(physical.len());
        let mut i = 0;

        while let Some(&line) = physical.get(i) {
            let trimmed = line.trim_start();
            if trimmed.is_empty() {
                lines.push(Line::Blank(line.to_string()));
                i += 1;
                continue;
            }
            if trimmed.starts_with('#') || trimmed.starts_with('!') {
                lines.push(Line::Comment(line.to_string()));
                i += 1;
                continue;
            }

            let mut raw = line.to_string();
            let mut logical = line.to_string();
            while has_continuation(&logical) {
                logical.pop();
                let Some(&next) = physical.get(i + 1) else {
                    break;
                };
                i += 1;
                raw.push('\n');
                raw.push_str(next);
                logical.push_str(next.trim_start());
            }

            let (key, separator, value) = parse_entry(&logical);
            if let Some(Line::Entry(existing)) = lines
                .iter_mut()
                .find(|l| matches!(l, Line::Entry(e) if e.key == key))
            {
                // Multi-valued property: flatten into the first occurrence.
                existing.value.push_str(JOIN_DELIMITER);
                existing.value.push_str(&value);
                existing.raw = None;
            } else {
                lines.push(Line::Entry(Entry { key, value, separator, raw: Some(raw) }));
            }
            i += 1;
        }

        Self { lines, modified: false }
    }

    /// Keys in file order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry(entry) => Some(entry.key.as_str()),
            _ => None,
        })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| match line {
            Line::Entry(entry) if entry.key == key => Some(entry.value.as_str()),
            _ => None,
        })
    }

    /// Sets or appends a value. Returns true if the file changed; setting a
    /// key to its current value is a no-op so untouched files stay untouched.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        if let Some(index) = self.position(key) {
            let Some(Line::Entry(entry)) = self.lines.get_mut(index) else {
                return false;
            };
            if entry.value == value {
                return false;
            }
            entry.value = value.to_string();
            entry.raw = None;
        } else {
            self.lines.push(Line::Entry(Entry {
                key: key.to_string(),
                value: value.to_string(),
                separator: Separator::Equals,
                raw: None,
            }));
        }
        self.modified = true;
        true
    }

    /// Removes a key entirely. Returns true if it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        self.lines.remove(index);
        self.modified = true;
        true
    }

    /// Turns an entry into a comment line, preserving its last known value
    /// for later recovery. Returns true if the key existed.
    pub fn comment_out(&mut self, key: &str) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        let Some(Line::Entry(entry)) = self.lines.get(index) else {
            return false;
        };

        let text = match &entry.raw {
            Some(raw) => {
                raw.lines().map(|l| format!("# {l}")).collect::<Vec<_>>().join("\n")
            },
            None => format!("# {}", entry.render()),
        };
        if let Some(slot) = self.lines.get_mut(index) {
            *slot = Line::Comment(text);
        }
        self.modified = true;
        true
    }

    /// Number of active (non-comment) entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.iter().filter(|l| matches!(l, Line::Entry(_))).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once any entry was added, changed, removed or commented out.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Serializes the file; untouched lines are emitted verbatim.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Blank(raw) | Line::Comment(raw) => out.push_str(raw),
                Line::Entry(entry) => out.push_str(&entry.render()),
            }
            out.push('\n');
        }
        out
    }

    /// Encodes and writes the file.
    ///
    /// # Errors
    /// Any I/O failure while writing.
    pub fn store(&self, path: &Path, charset: Charset) -> Result<(), PropertiesError> {
        fs::write(path, charset.encode(&self.render()))
            .map_err(|source| PropertiesError::Write { path: path.to_path_buf(), source })
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.lines.iter().position(|l| matches!(l, Line::Entry(e) if e.key == key))
    }
}

/// A line continues when it ends in an odd number of backslashes.
fn has_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn parse_entry(logical: &str) -> (String, Separator, String) {
    let s = logical.trim_start();

    let mut key_end = s.len();
    let mut sep_char = None;
    let mut escaped = false;
    for (idx, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = idx;
                sep_char = Some(c);
                break;
            },
            c if c.is_whitespace() => {
                key_end = idx;
                break;
            },
            _ => {},
        }
    }

    let raw_key = &s[..key_end];
    let mut rest = &s[key_end..];
    let separator = if let Some(c) = sep_char {
        rest = rest[c.len_utf8()..].trim_start();
        if c == '=' { Separator::Equals } else { Separator::Colon }
    } else {
        rest = rest.trim_start();
        match rest.chars().next() {
            Some(c @ ('=' | ':')) => {
                rest = rest[c.len_utf8()..].trim_start();
                if c == '=' { Separator::Equals } else { Separator::Colon }
            },
            _ => Separator::Whitespace,
        }
    };

    (unescape(raw_key), separator, unescape(rest))
}

fn unescape(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }
        let Some(&next) = chars.get(i + 1) else {
            out.push('\\');
            break;
        };
        i += 2;
        match next {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\u{000C}'),
            'u' => match read_code_unit(&chars, i) {
                Some(unit) => {
                    i += 4;
                    if (0xD800..=0xDBFF).contains(&unit)
                        && chars.get(i) == Some(&'\\')
                        && chars.get(i + 1) == Some(&'u')
                        && let Some(low) = read_code_unit(&chars, i + 2)
                        && (0xDC00..=0xDFFF).contains(&low)
                    {
                        i += 6;
                        if let Some(c) = char::decode_utf16([unit, low]).next().and_then(Result::ok)
                        {
                            out.push(c);
                        }
                    } else if let Some(c) = char::from_u32(u32::from(unit)) {
                        out.push(c);
                    } else {
                        out.push(char::REPLACEMENT_CHARACTER);
                    }
                },
                None => {
                    out.push('\\');
                    out.push('u');
                },
            },
            other => out.push(other),
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn read_code_unit(chars: &[char], at: usize) -> Option<u16> {
    let digits = chars.get(at..at.checked_add(4)?)?;
    let mut value: u16 = 0;
    for &d in digits {
        value = value.checked_mul(16)?.checked_add(d.to_digit(16)? as u16)?;
    }
    Some(value)
}

fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ' ' => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' => out.push_str("\\="),
            ':' => out.push_str("\\:"),
            '#' => out.push_str("\\#"),
            '!' => out.push_str("\\!"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut leading = true;
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ' ' if leading => {
                out.push_str("\\ ");
                continue;
            },
            _ => out.push(c),
        }
        leading = false;
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use googletest::prelude::*;
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    #[rstest]
    #[case::equals("greeting=Hello", "greeting", "Hello")]
    #[case::equals_padded("greeting = Hello", "greeting", "Hello")]
    #[case::colon("greeting: Hello", "greeting", "Hello")]
    #[case::whitespace("greeting Hello", "greeting", "Hello")]
    #[case::leading_whitespace("   greeting=Hello", "greeting", "Hello")]
    #[case::empty_value("greeting=", "greeting", "")]
    #[case::empty_key("=orphan", "", "orphan")]
    #[case::escaped_separator_in_key("a\\=b=c", "a=b", "c")]
    #[case::trailing_spaces_kept("greeting=Hello  ", "greeting", "Hello  ")]
    fn parse_single_entry(#[case] text: &str, #[case] key: &str, #[case] value: &str) {
        let file = PropertiesFile::parse(text);

        assert_that!(file.len(), eq(1));
        assert_that!(file.get(key), some(eq(value)));
    }

    #[rstest]
    fn parse_preserves_key_order_and_skips_comments() {
        let file = PropertiesFile::parse("# header\nb=2\n\n! note\na=1\n");

        let keys: Vec<&str> = file.keys().collect();
        assert_that!(keys, elements_are![eq(&"b"), eq(&"a")]);
    }

    #[rstest]
    fn parse_continuation_lines() {
        let file = PropertiesFile::parse("message=Hello \\\n    World\n");

        assert_that!(file.get("message"), some(eq("Hello World")));
    }

    #[rstest]
    fn parse_escaped_backslash_is_not_a_continuation() {
        let file = PropertiesFile::parse("path=C\\\\\nnext=1\n");

        assert_that!(file.get("path"), some(eq("C\\")));
        assert_that!(file.get("next"), some(eq("1")));
    }

    #[rstest]
    fn parse_unicode_escapes() {
        let file = PropertiesFile::parse("cat=\\u732B\nclef=\\uD834\\uDD1E\n");

        assert_that!(file.get("cat"), some(eq("猫")));
        assert_that!(file.get("clef"), some(eq("𝄞")));
    }

    #[rstest]
    fn parse_flattens_duplicate_keys() {
        let file = PropertiesFile::parse("list=a\nother=x\nlist=b\n");

        assert_that!(file.get("list"), some(eq("a,b")));
        assert_that!(file.len(), eq(2));
        assert_that!(file.is_modified(), eq(false));
    }

    #[rstest]
    fn render_round_trips_untouched_lines() {
        let text = "# header\ngreeting = Hello\n\nfarewell: Bye\n";
        let file = PropertiesFile::parse(text);

        assert_that!(file.render().as_str(), eq(text));
    }

    #[rstest]
    fn set_same_value_does_not_modify() {
        let mut file = PropertiesFile::parse("greeting = Hello\n");

        assert_that!(file.set("greeting", "Hello"), eq(false));
        assert_that!(file.is_modified(), eq(false));
        assert_that!(file.render().as_str(), eq("greeting = Hello\n"));
    }

    #[rstest]
    fn set_new_value_rewrites_only_that_line() {
        let mut file = PropertiesFile::parse("# header\ngreeting = Hello\nfarewell = Bye\n");

        assert_that!(file.set("greeting", "Howdy"), eq(true));
        assert_that!(file.is_modified(), eq(true));
        assert_that!(file.render().as_str(), eq("# header\ngreeting=Howdy\nfarewell = Bye\n"));
    }

    #[rstest]
    fn set_unknown_key_appends() {
        let mut file = PropertiesFile::parse("a=1\n");
        file.set("b", "2");

        let keys: Vec<&str> = file.keys().collect();
        assert_that!(keys, elements_are![eq(&"a"), eq(&"b")]);
        assert_that!(file.render().as_str(), eq("a=1\nb=2\n"));
    }

    #[rstest]
    fn remove_deletes_the_line() {
        let mut file = PropertiesFile::parse("a=1\nb=2\n");

        assert_that!(file.remove("a"), eq(true));
        assert_that!(file.remove("missing"), eq(false));
        assert_that!(file.render().as_str(), eq("b=2\n"));
    }

    #[rstest]
    fn comment_out_preserves_the_value() {
        let mut file = PropertiesFile::parse("a=1\nb=2\n");

        assert_that!(file.comment_out("b"), eq(true));
        assert_that!(file.get("b"), none());
        assert_that!(file.len(), eq(1));
        assert_that!(file.render().as_str(), eq("a=1\n# b=2\n"));
    }

    #[rstest]
    fn empty_key_survives_edits() {
        let mut file = PropertiesFile::parse("=orphan\n");

        assert_that!(file.set("", "found"), eq(true));
        assert_that!(file.get(""), some(eq("found")));
    }

    #[rstest]
    fn new_entries_escape_special_characters() {
        let mut file = PropertiesFile::new();
        file.set("white space", "line\nbreak");

        assert_that!(file.render().as_str(), eq("white\\ space=line\\nbreak\n"));

        let reparsed = PropertiesFile::parse(&file.render());
        assert_that!(reparsed.get("white space"), some(eq("line\nbreak")));
    }

    #[rstest]
    fn store_and_load_latin1() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("messages_de.properties");
        let mut file = PropertiesFile::new();
        file.set("coin", "Münze");
        file.set("cat", "猫");
        file.store(&path, Charset::Latin1).unwrap();

        let reloaded = PropertiesFile::load(&path, Charset::Latin1).unwrap();
        assert_that!(reloaded.get("coin"), some(eq("Münze")));
        assert_that!(reloaded.get("cat"), some(eq("猫")));
    }

    #[rstest]
    fn load_rejects_invalid_utf8() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.properties");
        std::fs::write(&path, [0x61, 0x3D, 0xFF, 0xFE]).unwrap();

        let result = PropertiesFile::load(&path, Charset::Utf8);

        assert_that!(result.is_err(), eq(true));
        assert_that!(matches!(result.unwrap_err(), PropertiesError::Decode { .. }), eq(true));
    }
}
