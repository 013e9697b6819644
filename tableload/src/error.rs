//! Error types for the tableload import pipeline.
//!
//! - [`ConfigError`] - Invalid import definitions (fatal, raised before any row is read)
//! - [`SourceError`] - Record source failures (opening, decoding, CSV parsing)
//! - [`SinkError`] - Relational sink failures (introspection, statement execution)
//! - [`ImportError`] - Top-level error returned by [`crate::import::Importer::import`]
//!
//! Row-level transformer rejections and sink failures during paging are not
//! errors at this level: they are reported through [`crate::models::ImportReport`].

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in an import definition.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mapping entry whose key/value kinds match no accepted shape.
    #[error("Invalid `{key}` of type <{kind}> on {owner}::mapping")]
    InvalidMappingEntry {
        key: String,
        kind: String,
        owner: String,
    },

    /// A `[target, callable]` pair with the wrong arity or element types.
    #[error("Should have exactly two elements [string, callable]. `{key}` on {owner}::mapping")]
    MalformedPair { key: String, owner: String },

    /// A computed field definition that could not be compiled.
    #[error("Invalid transform for `{key}`: {message}")]
    InvalidTransform { key: String, message: String },

    /// Additional fields given as something other than a keyed map.
    #[error("Additional fields on {owner} must be a keyed map, got <{kind}>")]
    AdditionalFieldsNotKeyed { owner: String, kind: String },

    /// An additional field value that is neither a scalar nor a callable.
    #[error("Additional field `{field}` on {owner} has unsupported type <{kind}>")]
    InvalidAdditionalField {
        field: String,
        kind: String,
        owner: String,
    },

    /// Ignored columns given as a keyed map.
    #[error("Ignored columns on {owner} cannot be a keyed map")]
    IgnoredColumnsKeyed { owner: String },

    /// An ignored column entry that is not a column name.
    #[error("Ignored column on {owner} must be a string, got <{kind}>")]
    InvalidIgnoredColumn { owner: String, kind: String },

    /// Neither the header nor the declared mapping produced any column.
    #[error("Table fields could not be decided from header and mapping on {owner}")]
    NoColumns { owner: String },

    /// The header names the same column twice.
    #[error("Header column `{column}` appears more than once on {owner}")]
    DuplicateColumn { column: String, owner: String },

    /// The header has an empty name, usually from a trailing delimiter.
    #[error("Header column {position} has no name on {owner}")]
    BlankHeaderColumn { position: usize, owner: String },

    /// The validated plan has nothing to insert.
    #[error("Nothing to import from {owner}")]
    NothingToImport { owner: String },

    /// Two plan entries or additional fields write the same destination field.
    #[error("Destination field `{0}` is written more than once")]
    DuplicateTarget(String),

    /// No destination table could be determined.
    #[error("Table name is required")]
    MissingTable,

    /// The destination table does not exist (only checked when `verify_table` is set).
    #[error("Table {0} does not exist")]
    TableNotFound(String),

    /// An insert field is not a column of the destination table.
    #[error("Column `{column}` does not exist on table {table}")]
    UnknownColumn { table: String, column: String },

    /// Delimiter, enclosure or escape is not a single ASCII character.
    #[error("CSV {option} must be a single ASCII character, got {value:?}")]
    InvalidCharacter { option: &'static str, value: String },

    /// Page size of zero.
    #[error("Page size must be greater than zero")]
    InvalidPageSize,

    /// Definition file could not be read.
    #[error("Cannot read definition {path}: {source}")]
    DefinitionRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Definition file is not valid JSON for the expected shape.
    #[error("Invalid definition: {0}")]
    DefinitionFormat(#[from] serde_json::Error),
}

// =============================================================================
// Record Source Errors
// =============================================================================

/// Errors while opening or reading the record source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Source file does not exist.
    #[error("CSV file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the underlying bytes.
    #[error("Failed to read source: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to decode the source bytes.
    #[error("Failed to decode source: {0}")]
    Encoding(String),

    /// Malformed CSV record.
    #[error("Invalid CSV: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Relational Sink Errors
// =============================================================================

/// Errors reported by a relational sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Could not open or use the connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Schema introspection failed.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A statement failed for the given values.
    #[error("{0}")]
    Execution(String),
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Execution(err.to_string())
    }
}

// =============================================================================
// Import Errors (top-level)
// =============================================================================

/// Hard failures of an import run.
///
/// A returned `ImportError` means the run did not get to paging, or failed
/// outside of row execution. Vetoes and sink failures on rows are reported as
/// an [`crate::models::ImportStatus`] instead.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Invalid definition.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Record source failure.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Sink failure outside of row execution.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),
}

impl ImportError {
    /// Whether the run was stopped by its definition before touching any row.
    pub fn is_config(&self) -> bool {
        matches!(self, ImportError::Config(_))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for definition and plan building.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for record source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for import runs.
pub type ImportResult<T> = Result<T, ImportError>;
