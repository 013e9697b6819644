//! Record sources.
//!
//! A [`RecordSource`] yields ordered rows of named string fields and pages
//! through them by offset and limit. [`CsvSource`] reads delimited text from
//! an [`Origin`].

pub mod delimited;
pub mod decode;

pub use delimited::CsvSource;
pub use decode::{decode, detect_encoding};

use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult, SourceResult};
use crate::models::Row;

/// Paged access to source records.
pub trait RecordSource {
    /// First record of the source, untouched. Reading it does not move the
    /// paging cursor.
    fn read_header(&mut self) -> SourceResult<Vec<String>>;

    /// Up to `limit` records starting at record `offset` (0-based, header
    /// included). Field `i` of a record is stored under `field_names[i]`;
    /// missing trailing fields are empty and extra fields are dropped.
    fn fetch_page(&mut self, offset: usize, limit: usize, field_names: &[String]) -> SourceResult<Vec<Row>>;
}

/// Where the source bytes come from.
pub enum Origin {
    /// In-memory content.
    Text(String),
    /// An open byte stream, read to the end on open.
    Stream(Box<dyn Read + Send>),
    /// A file path.
    File(PathBuf),
}

impl Origin {
    /// First non-empty origin in priority order: text, stream, file.
    pub fn choose(
        text: Option<String>,
        stream: Option<Box<dyn Read + Send>>,
        file: Option<PathBuf>,
    ) -> Option<Origin> {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            return Some(Origin::Text(text));
        }
        if let Some(stream) = stream {
            return Some(Origin::Stream(stream));
        }
        file.filter(|f| !f.as_os_str().is_empty()).map(Origin::File)
    }

    pub fn kind(&self) -> OriginKind {
        match self {
            Origin::Text(_) => OriginKind::String,
            Origin::Stream(_) => OriginKind::Stream,
            Origin::File(_) => OriginKind::File,
        }
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Origin::Stream(_) => f.write_str("Stream(..)"),
            Origin::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// Origin kind reported in the `prepared-reader` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginKind {
    String,
    Stream,
    File,
    /// A record source supplied directly to the importer.
    Custom,
}

impl OriginKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OriginKind::String => "string",
            OriginKind::Stream => "stream",
            OriginKind::File => "file",
            OriginKind::Custom => "custom",
        }
    }
}

impl fmt::Display for OriginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delimited text options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: char,
    pub enclosure: char,
    pub escape: char,
    /// Encoding label; detected when unset.
    pub encoding: Option<String>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            enclosure: '"',
            escape: '\\',
            encoding: None,
        }
    }
}

impl CsvOptions {
    /// Build from user strings; each control character must be a single
    /// ASCII character.
    pub fn from_strings(delimiter: &str, enclosure: &str, escape: &str) -> ConfigResult<Self> {
        Ok(Self {
            delimiter: single_ascii("delimiter", delimiter)?,
            enclosure: single_ascii("enclosure", enclosure)?,
            escape: single_ascii("escape", escape)?,
            encoding: None,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (option, c) in [
            ("delimiter", self.delimiter),
            ("enclosure", self.enclosure),
            ("escape", self.escape),
        ] {
            if !c.is_ascii() {
                return Err(ConfigError::InvalidCharacter {
                    option,
                    value: c.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn single_ascii(option: &'static str, value: &str) -> ConfigResult<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii() => Ok(c),
        _ => Err(ConfigError::InvalidCharacter {
            option,
            value: value.to_string(),
        }),
    }
}
