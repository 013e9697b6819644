//! Relational sinks.
//!
//! A [`RelationalSink`] introspects the destination schema and executes one
//! parameterized insert per row. [`SqliteSink`] writes to SQLite through
//! rusqlite; [`MemorySink`] keeps rows in memory for dry runs and tests.

pub mod memory;
pub mod sqlite;

pub use memory::MemorySink;
pub use sqlite::SqliteSink;

use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult, SinkResult};

/// A prepared insert for one table and field list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    pub table: String,
    pub fields: Vec<String>,
    pub sql: String,
}

impl InsertStatement {
    pub fn new(table: &str, fields: &[String]) -> ConfigResult<Self> {
        Ok(Self {
            sql: build_insert_query(table, fields)?,
            table: table.to_string(),
            fields: fields.to_vec(),
        })
    }
}

/// Destination of imported rows.
pub trait RelationalSink {
    fn table_exists(&mut self, table: &str) -> SinkResult<bool>;

    fn column_names(&mut self, table: &str) -> SinkResult<Vec<String>>;

    /// Prepare the insert used for every row of a run.
    fn prepare_insert(&mut self, statement: &InsertStatement) -> SinkResult<()>;

    /// Insert one row; `values` are positional over `statement.fields`.
    fn execute(&mut self, statement: &InsertStatement, values: &[Value]) -> SinkResult<()>;

    /// Release whatever `prepare_insert` acquired.
    fn finish(&mut self, statement: &InsertStatement);
}

/// Render `INSERT INTO "t" ("a", "b") VALUES (?1, ?2)`.
pub fn build_insert_query(table: &str, fields: &[String]) -> ConfigResult<String> {
    if table.trim().is_empty() {
        return Err(ConfigError::MissingTable);
    }
    let columns: Vec<String> = fields.iter().map(|f| quote_identifier(f)).collect();
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table),
        columns.join(", "),
        placeholders.join(", ")
    ))
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Holds a prepared statement for one run and finishes it on drop.
pub struct StatementGuard<'a> {
    sink: &'a mut dyn RelationalSink,
    statement: InsertStatement,
}

impl<'a> StatementGuard<'a> {
    pub fn prepare(sink: &'a mut dyn RelationalSink, statement: InsertStatement) -> SinkResult<Self> {
        sink.prepare_insert(&statement)?;
        debug!(sql = %statement.sql, "prepared insert");
        Ok(Self { sink, statement })
    }

    pub fn statement(&self) -> &InsertStatement {
        &self.statement
    }

    pub fn execute(&mut self, values: &[Value]) -> SinkResult<()> {
        self.sink.execute(&self.statement, values)
    }
}

impl Drop for StatementGuard<'_> {
    fn drop(&mut self) {
        self.sink.finish(&self.statement);
        debug!(table = %self.statement.table, "released insert statement");
    }
}
