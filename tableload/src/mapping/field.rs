//! Computed field definitions.
//!
//! A [`FieldTransform`] is the file-friendly way to write a transformer: it
//! reads one column, optionally falls back to a default, and compiles into a
//! [`Transformer`] with the usual `(row, row_number)` contract. Anything
//! beyond that belongs in a closure passed through [`super::Spec::callable`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigResult;
use crate::models::{Row, Transformed, Transformer};

/// Column read with an optional fallback for a single field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldTransform {
    /// Source column (defaults to the key that owns this definition)
    #[serde(default)]
    pub source: Option<String>,

    /// Value used when the column is missing or blank
    #[serde(default)]
    pub default: Option<Value>,

    /// Reject the row when the column is blank and there is no default
    #[serde(default)]
    pub required: bool,
}

impl FieldTransform {
    /// Read a single column
    pub fn from_source(source: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            ..Default::default()
        }
    }

    /// Set the default value
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Compile into a transformer. `key` is the owning mapping key, used as
    /// the source column when none is named.
    pub fn compile(self, key: &str) -> ConfigResult<Transformer> {
        let column = self.source.unwrap_or_else(|| key.to_string());
        let default = self.default;
        let required = self.required;

        Ok(Transformer::new(move |row, _row_number| {
            apply(row, &column, default.as_ref(), required)
        }))
    }
}

fn apply(row: &Row, column: &str, default: Option<&Value>, required: bool) -> Transformed {
    match row.get(column) {
        Some(value) if !value.trim().is_empty() => Transformed::Value(Value::String(value.clone())),
        _ => match default {
            Some(default) => Transformed::Value(default.clone()),
            None if required => Transformed::Skip,
            None => Transformed::Value(Value::Null),
        },
    }
}
