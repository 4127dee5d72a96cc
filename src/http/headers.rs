//! Case-insensitive header storage and field-line parsing.
//!
//! # Responsibilities
//! - Store header fields keyed by lower-cased name
//! - Combine repeated fields as `"v1, v2"` instead of overwriting
//! - Parse `Name: value CRLF` lines incrementally from a byte buffer
//!
//! # Design Decisions
//! - Names are validated as HTTP tokens before anything is stored
//! - Parsing is resumable: callers pass only the unconsumed remainder
//! - Insertion order is kept so serialization is deterministic

use indexmap::IndexMap;
use thiserror::Error;

use super::{find_crlf, CRLF};

/// Errors raised while parsing a header block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The field-line has no `:` separator.
    #[error("malformed field-line: {0:?}")]
    MalformedFieldLine(String),

    /// Whitespace between the field name and the colon.
    #[error("malformed field-name: {0:?}")]
    MalformedFieldName(String),

    /// The field name contains a character outside the token set.
    #[error("malformed header-name: {0:?}")]
    MalformedHeaderName(String),
}

/// Returns true when `byte` belongs to the HTTP token character class.
pub fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}

/// Returns true when `name` is a non-empty HTTP token.
pub fn is_token(name: &[u8]) -> bool {
    !name.is_empty() && name.iter().copied().all(is_token_byte)
}

/// Split one field-line (without its CRLF) into name and value.
fn parse_field_line(line: &[u8]) -> Result<(&[u8], &[u8]), HeaderError> {
    let colon = line
        .iter()
        .position(|&b| b == b':')
        .ok_or_else(|| {
            HeaderError::MalformedFieldLine(String::from_utf8_lossy(line).into_owned())
        })?;

    let name = line[..colon].trim_ascii_start();
    let value = line[colon + 1..].trim_ascii();

    if name.ends_with(b" ") {
        return Err(HeaderError::MalformedFieldName(
            String::from_utf8_lossy(name).into_owned(),
        ));
    }

    Ok((name, value))
}

/// A case-insensitive, multi-value header collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: IndexMap<String, String>,
}

impl Headers {
    /// Create an empty header collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a header value by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns true when a header with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(&name.to_ascii_lowercase())
    }

    /// Add a header value.
    ///
    /// If the name is already present the new value is appended to the
    /// existing one, separated by `", "`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        self.fields
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Overwrite a header value, inserting it if absent.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Remove a header, returning its value if it was present.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.shift_remove(&name.to_ascii_lowercase())
    }

    /// Number of distinct header names.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse as many complete field-lines from `data` as possible.
    ///
    /// Returns the number of bytes consumed and whether the empty line ending
    /// the header block was reached. On error nothing is reported as consumed,
    /// but fields stored by earlier lines of the same call are kept.
    pub fn parse(&mut self, data: &[u8]) -> Result<(usize, bool), HeaderError> {
        let mut consumed = 0;

        while let Some(idx) = find_crlf(&data[consumed..]) {
            if idx == 0 {
                return Ok((consumed + CRLF.len(), true));
            }

            let (name, value) = parse_field_line(&data[consumed..consumed + idx])?;
            if !is_token(name) {
                return Err(HeaderError::MalformedHeaderName(
                    String::from_utf8_lossy(name).into_owned(),
                ));
            }

            // Token bytes are ASCII, so the name is valid UTF-8.
            let name = String::from_utf8_lossy(name);
            self.set(&name, String::from_utf8_lossy(value));
            consumed += idx + CRLF.len();
        }

        Ok((consumed, false))
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a String);
    type IntoIter = indexmap::map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
