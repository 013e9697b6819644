//! Domain models for the import pipeline.
//!
//! - [`Row`] - One source record, keyed by plan source columns
//! - [`Transformer`] / [`Transformed`] - User callables and their `Value | Skip` result
//! - [`ColumnBinding`] / [`ColumnPlanEntry`] / [`ColumnPlan`] - The validated column plan
//! - [`RowError`] - A row-level error report
//! - [`ImportStatus`] / [`ImportReport`] - Outcome of a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A source record keyed by source-column name.
pub type Row = HashMap<String, String>;

// =============================================================================
// Transformers
// =============================================================================

/// Result of a transformer call.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Value to insert.
    Value(Value),
    /// Reject the current row: it is reported and not inserted.
    Skip,
}

impl Transformed {
    pub fn is_skip(&self) -> bool {
        matches!(self, Transformed::Skip)
    }
}

impl From<Value> for Transformed {
    fn from(value: Value) -> Self {
        Transformed::Value(value)
    }
}

impl From<&str> for Transformed {
    fn from(value: &str) -> Self {
        Transformed::Value(Value::String(value.to_string()))
    }
}

impl From<String> for Transformed {
    fn from(value: String) -> Self {
        Transformed::Value(Value::String(value))
    }
}

type TransformFn = dyn Fn(&Row, usize) -> Transformed + Send + Sync;

/// A user-supplied value function called with `(row, row_number)`.
///
/// `row_number` is the absolute 1-based position of the record in the source.
#[derive(Clone)]
pub struct Transformer(Arc<TransformFn>);

impl Transformer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Row, usize) -> Transformed + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn call(&self, row: &Row, row_number: usize) -> Transformed {
        (self.0)(row, row_number)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transformer(..)")
    }
}

// =============================================================================
// Column Plan
// =============================================================================

/// How a source column reaches the destination table.
#[derive(Debug, Clone)]
pub enum ColumnBinding {
    /// Copied verbatim into a field of the same name.
    Identity,
    /// Copied verbatim into a differently named field.
    Renamed(String),
    /// Value produced by a transformer.
    Computed {
        target: String,
        transform: Transformer,
    },
    /// Read for positional alignment, never inserted.
    Excluded,
}

/// One source-to-target binding of the plan.
#[derive(Debug, Clone)]
pub struct ColumnPlanEntry {
    pub source_column: String,
    pub binding: ColumnBinding,
}

impl ColumnPlanEntry {
    pub fn new(source_column: impl Into<String>, binding: ColumnBinding) -> Self {
        Self {
            source_column: source_column.into(),
            binding,
        }
    }

    /// Destination field, `None` for excluded columns.
    pub fn target_field(&self) -> Option<&str> {
        match &self.binding {
            ColumnBinding::Identity => Some(&self.source_column),
            ColumnBinding::Renamed(target) => Some(target),
            ColumnBinding::Computed { target, .. } => Some(target),
            ColumnBinding::Excluded => None,
        }
    }

    pub fn transform(&self) -> Option<&Transformer> {
        match &self.binding {
            ColumnBinding::Computed { transform, .. } => Some(transform),
            _ => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        matches!(self.binding, ColumnBinding::Excluded)
    }
}

/// Ordered, validated column bindings. Source columns are unique.
#[derive(Debug, Clone, Default)]
pub struct ColumnPlan {
    entries: Vec<ColumnPlanEntry>,
}

impl ColumnPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, replacing in place any entry for the same source column.
    pub fn upsert(&mut self, entry: ColumnPlanEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.source_column == entry.source_column)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn entries(&self) -> &[ColumnPlanEntry] {
        &self.entries
    }

    pub fn get(&self, source_column: &str) -> Option<&ColumnPlanEntry> {
        self.entries.iter().find(|e| e.source_column == source_column)
    }

    pub(crate) fn get_mut(&mut self, source_column: &str) -> Option<&mut ColumnPlanEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.source_column == source_column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that produce a destination field.
    pub fn active_len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_excluded()).count()
    }

    /// Source column names in positional order, excluded entries included.
    pub fn source_columns(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.source_column.clone()).collect()
    }

    /// Destination fields in positional order.
    pub fn target_fields(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|e| e.target_field().map(str::to_string))
            .collect()
    }

    /// JSON summary used by the `plan` command.
    pub fn describe(&self) -> Value {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|e| {
                let kind = match e.binding {
                    ColumnBinding::Identity => "identity",
                    ColumnBinding::Renamed(_) => "renamed",
                    ColumnBinding::Computed { .. } => "computed",
                    ColumnBinding::Excluded => "excluded",
                };
                serde_json::json!({
                    "source": e.source_column,
                    "target": e.target_field(),
                    "binding": kind,
                })
            })
            .collect();
        Value::Array(entries)
    }
}

// =============================================================================
// Run Outcome
// =============================================================================

/// A row that was rejected or failed to insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    /// Absolute 1-based row number in the source.
    pub row: usize,
    pub message: String,
    /// Field-to-value map built before the failure.
    pub values: Map<String, Value>,
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportStatus {
    /// Every page was processed without a sink failure.
    Completed,
    /// The sink rejected a row; paging stopped there.
    Failed,
    /// A notification handler vetoed the named stage.
    Aborted { stage: String },
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStatus::Completed => f.write_str("completed"),
            ImportStatus::Failed => f.write_str("failed"),
            ImportStatus::Aborted { stage } => write!(f, "aborted at {}", stage),
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub status: ImportStatus,
    pub table: String,
    /// Rows executed successfully by the sink.
    pub inserted: usize,
    /// Rows rejected by a transformer.
    pub rejected: usize,
    /// Blank rows skipped without a report.
    pub skipped_empty: usize,
    /// Pages fetched that contained rows.
    pub pages: usize,
    pub errors: Vec<RowError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.status == ImportStatus::Completed
    }

    /// One-line summary for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} inserted, {} rejected, {} blank, {} pages into {}",
            self.status, self.inserted, self.rejected, self.skipped_empty, self.pages, self.table
        )
    }
}
