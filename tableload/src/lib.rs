//! # Tableload - column-mapped CSV to relational table importer
//!
//! Tableload reads delimited text page by page, maps each record's columns
//! onto table fields through a declarative mapping, and inserts the rows
//! through a prepared statement.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV source │────▶│ Column plan │────▶│   Importer  │────▶│    Sink     │
//! │ (paged read)│     │ (map+check) │     │ (row build) │     │  (INSERT)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                                                ▼
//!                                          lifecycle events
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tableload::{ImportDefinition, Importer, SqliteSink, Spec, TracingNotifier};
//!
//! let definition = ImportDefinition::builder("Company")
//!     .file("companies.csv")
//!     .header_as_table_field(true)
//!     .additional_fields(Spec::map([("created_by", "importer")]))
//!     .build()?;
//!
//! let mut sink = SqliteSink::open("app.db".as_ref())?;
//! let mut notifier = TracingNotifier;
//! let report = Importer::new(definition, &mut sink, &mut notifier).import()?;
//! println!("{}", report.summary());
//! # Ok::<(), tableload::ImportError>(())
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per layer
//! - [`models`] - Rows, column plans and run reports
//! - [`mapping`] - Mapping values and column defaults
//! - [`plan`] - Column resolution and mapping validation
//! - [`source`] - Paged record sources
//! - [`sink`] - Relational sinks (SQLite, in-memory)
//! - [`events`] - Lifecycle notifications
//! - [`import`] - Import definitions and the batch driver
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;

// Mapping
pub mod mapping;
pub mod plan;

// Input and output
pub mod sink;
pub mod source;

// Driver
pub mod events;
pub mod import;

pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    ConfigResult,
    ImportError,
    ImportResult,
    SinkError,
    SinkResult,
    SourceError,
    SourceResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ColumnBinding,
    ColumnPlan,
    ColumnPlanEntry,
    ImportReport,
    ImportStatus,
    Row,
    RowError,
    Transformed,
    Transformer,
};

// =============================================================================
// Re-exports - Mapping and planning
// =============================================================================

pub use mapping::{FieldTransform, Spec};

pub use plan::{AdditionalField, ColumnKey, FieldValue, ImportPlan};

// =============================================================================
// Re-exports - Sources and sinks
// =============================================================================

pub use source::{CsvOptions, CsvSource, Origin, OriginKind, RecordSource};

pub use sink::{InsertStatement, MemorySink, RelationalSink, SqliteSink, StatementGuard};

// =============================================================================
// Re-exports - Events
// =============================================================================

pub use events::{BroadcastNotifier, Event, EventBus, Notifier, Stage, TracingNotifier, Verdict};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{
    example_definition,
    load_definition,
    DefinitionFile,
    ImportDefinition,
    ImportDefinitionBuilder,
    Importer,
    plan_for,
};
