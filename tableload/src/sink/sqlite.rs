//! SQLite sink backed by rusqlite.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use super::{InsertStatement, RelationalSink};
use crate::error::{SinkError, SinkResult};

/// Inserts into a SQLite database. Statements run in autocommit mode, so
/// each executed row is committed on its own.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::Connection(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| SinkError::Connection(format!("Failed to open database: {}", e)))?;
        info!(path = %path.display(), "opened sqlite database");
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SinkError::Connection(format!("Failed to create in-memory database: {}", e)))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl RelationalSink for SqliteSink {
    fn table_exists(&mut self, table: &str) -> SinkResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                [table],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| SinkError::Schema(e.to_string()))?;
        Ok(found.is_some())
    }

    fn column_names(&mut self, table: &str) -> SinkResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
            .map_err(|e| SinkError::Schema(e.to_string()))?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| SinkError::Schema(e.to_string()))?;
        Ok(names)
    }

    /// Nothing is compiled up front: a missing table surfaces on the first
    /// executed row.
    fn prepare_insert(&mut self, statement: &InsertStatement) -> SinkResult<()> {
        debug!(table = %statement.table, fields = statement.fields.len(), "insert registered");
        Ok(())
    }

    fn execute(&mut self, statement: &InsertStatement, values: &[Value]) -> SinkResult<()> {
        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        stmt.execute(params_from_iter(values.iter().map(to_sql)))?;
        Ok(())
    }

    fn finish(&mut self, _statement: &InsertStatement) {
        self.conn.flush_prepared_statement_cache();
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
