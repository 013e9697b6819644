//! Delimited text source backed by the `csv` crate.

use csv::{ReaderBuilder, StringRecord};
use std::io::{Cursor, Read};
use std::sync::Arc;
use tracing::{debug, info};

use super::{decode, CsvOptions, Origin, OriginKind, RecordSource};
use crate::error::{SourceError, SourceResult};
use crate::models::Row;

type Reader = csv::Reader<Cursor<Arc<[u8]>>>;

/// Forward-only reader positioned at `position` (records consumed so far).
struct PagingCursor {
    reader: Reader,
    position: usize,
}

/// Delimited records decoded to UTF-8 and held in memory.
pub struct CsvSource {
    content: Arc<[u8]>,
    options: CsvOptions,
    kind: OriginKind,
    cursor: Option<PagingCursor>,
}

impl CsvSource {
    /// Read and decode the whole origin.
    pub fn open(origin: Origin, options: &CsvOptions) -> SourceResult<Self> {
        let kind = origin.kind();
        let bytes = match origin {
            Origin::Text(text) => text.into_bytes(),
            Origin::Stream(mut stream) => {
                let mut bytes = Vec::new();
                stream.read_to_end(&mut bytes)?;
                bytes
            }
            Origin::File(path) => {
                if !path.exists() {
                    return Err(SourceError::FileNotFound(path));
                }
                std::fs::read(&path)?
            }
        };

        let text = decode(&bytes, options.encoding.as_deref())?;
        info!(origin = %kind, bytes = bytes.len(), "opened record source");

        Ok(Self {
            content: Arc::from(text.into_bytes()),
            options: options.clone(),
            kind,
            cursor: None,
        })
    }

    /// Shortcut for in-memory content.
    pub fn from_text(text: impl Into<String>, options: &CsvOptions) -> SourceResult<Self> {
        Self::open(Origin::Text(text.into()), options)
    }

    pub fn origin_kind(&self) -> OriginKind {
        self.kind
    }

    /// Cursor positioned at or before `offset`; rewinds only when needed.
    fn cursor_for(&mut self, offset: usize) -> &mut PagingCursor {
        if self.cursor.as_ref().map_or(false, |c| c.position > offset) {
            debug!(offset, "rewinding reader");
            self.cursor = None;
        }
        let (content, options) = (&self.content, &self.options);
        self.cursor.get_or_insert_with(|| PagingCursor {
            reader: build_reader(content, options),
            position: 0,
        })
    }
}

impl RecordSource for CsvSource {
    fn read_header(&mut self) -> SourceResult<Vec<String>> {
        let mut reader = build_reader(&self.content, &self.options);
        let mut record = StringRecord::new();
        if reader.read_record(&mut record)? {
            Ok(record.iter().map(str::to_string).collect())
        } else {
            Ok(Vec::new())
        }
    }

    fn fetch_page(&mut self, offset: usize, limit: usize, field_names: &[String]) -> SourceResult<Vec<Row>> {
        let cursor = self.cursor_for(offset);
        let mut record = StringRecord::new();

        while cursor.position < offset {
            if !cursor.reader.read_record(&mut record)? {
                return Ok(Vec::new());
            }
            cursor.position += 1;
        }

        let mut rows = Vec::with_capacity(limit);
        while rows.len() < limit && cursor.reader.read_record(&mut record)? {
            cursor.position += 1;
            rows.push(rekey(&record, field_names));
        }
        Ok(rows)
    }
}

fn build_reader(content: &Arc<[u8]>, options: &CsvOptions) -> Reader {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter as u8)
        .quote(options.enclosure as u8);
    if options.escape != options.enclosure {
        builder.escape(Some(options.escape as u8));
    }
    builder.from_reader(Cursor::new(Arc::clone(content)))
}

fn rekey(record: &StringRecord, field_names: &[String]) -> Row {
    field_names
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), record.get(i).unwrap_or("").to_string()))
        .collect()
}
