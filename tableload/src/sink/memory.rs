//! In-memory sink for dry runs and tests.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use super::{InsertStatement, RelationalSink};
use crate::error::{SinkError, SinkResult};

type FailurePredicate = Box<dyn Fn(&Map<String, Value>) -> Option<String> + Send>;

#[derive(Debug, Default)]
struct MemoryTable {
    /// Empty means any column is accepted.
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

/// Rows kept in memory, keyed by table.
#[derive(Default)]
pub struct MemorySink {
    tables: BTreeMap<String, MemoryTable>,
    fail_when: Option<FailurePredicate>,
    executed: usize,
    finished: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table. An empty column list accepts any field.
    pub fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
        self.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Fail `execute` with the returned message when the predicate matches.
    pub fn fail_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Option<String> + Send + 'static,
    {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn rows(&self, table: &str) -> &[Map<String, Value>] {
        self.tables.get(table).map(|t| t.rows.as_slice()).unwrap_or(&[])
    }

    /// Number of `execute` calls, failed ones included.
    pub fn executed(&self) -> usize {
        self.executed
    }

    /// Number of statements released.
    pub fn finished(&self) -> usize {
        self.finished
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("tables", &self.tables)
            .field("executed", &self.executed)
            .field("finished", &self.finished)
            .finish()
    }
}

impl RelationalSink for MemorySink {
    fn table_exists(&mut self, table: &str) -> SinkResult<bool> {
        Ok(self.tables.contains_key(table))
    }

    fn column_names(&mut self, table: &str) -> SinkResult<Vec<String>> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| SinkError::Schema(format!("no such table: {}", table)))
    }

    fn prepare_insert(&mut self, _statement: &InsertStatement) -> SinkResult<()> {
        Ok(())
    }

    fn execute(&mut self, statement: &InsertStatement, values: &[Value]) -> SinkResult<()> {
        self.executed += 1;

        let table = self
            .tables
            .get_mut(&statement.table)
            .ok_or_else(|| SinkError::Execution(format!("no such table: {}", statement.table)))?;

        if let Some(unknown) = statement
            .fields
            .iter()
            .find(|f| !table.columns.is_empty() && !table.columns.contains(f))
        {
            return Err(SinkError::Execution(format!(
                "table {} has no column named {}",
                statement.table, unknown
            )));
        }

        let row: Map<String, Value> = statement
            .fields
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect();

        if let Some(message) = self.fail_when.as_ref().and_then(|predicate| predicate(&row)) {
            return Err(SinkError::Execution(message));
        }

        table.rows.push(row);
        Ok(())
    }

    fn finish(&mut self, _statement: &InsertStatement) {
        self.finished += 1;
    }
}
