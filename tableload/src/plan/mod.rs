//! Column planning.
//!
//! Runs once per import, before any page is fetched:
//!
//! 1. `resolver` merges the header and the declared mapping
//! 2. `validator` classifies every entry into a [`ColumnBinding`]
//! 3. ignored columns are switched to [`ColumnBinding::Excluded`]
//! 4. the insert field list is built from plan targets and additional fields

pub mod additional;
pub mod resolver;
pub mod validator;

pub use additional::{parse_additional_fields, AdditionalField, FieldValue};
pub use resolver::{resolve, ResolvedColumns};
pub use validator::validate;

use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::mapping::Spec;
use crate::models::{ColumnBinding, ColumnPlan};

/// Key of a resolved column: a source column name, or a position for
/// list-shaped mappings where the value names the column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    Name(String),
    Position(usize),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Name(name) => f.write_str(name),
            ColumnKey::Position(i) => write!(f, "{}", i),
        }
    }
}

/// Parse the ignored columns option: a flat list of column names.
pub fn parse_ignored_columns(spec: &Spec, owner: &str) -> ConfigResult<Vec<String>> {
    match spec {
        Spec::Null => Ok(Vec::new()),
        Spec::Map(entries) if entries.is_empty() => Ok(Vec::new()),
        Spec::Map(_) => Err(ConfigError::IgnoredColumnsKeyed {
            owner: owner.to_string(),
        }),
        Spec::List(items) => items
            .iter()
            .map(|item| match item {
                Spec::Text(name) => Ok(name.trim().to_string()),
                other => Err(ConfigError::InvalidIgnoredColumn {
                    owner: owner.to_string(),
                    kind: other.kind().to_string(),
                }),
            })
            .collect(),
        other => Err(ConfigError::InvalidIgnoredColumn {
            owner: owner.to_string(),
            kind: other.kind().to_string(),
        }),
    }
}

/// Mark ignored source columns as excluded. Unknown names are logged.
pub fn exclude_ignored(plan: &mut ColumnPlan, ignored: &[String]) {
    for name in ignored {
        match plan.get_mut(name) {
            Some(entry) => {
                debug!(column = %name, "excluding ignored column");
                entry.binding = ColumnBinding::Excluded;
            }
            None => warn!(column = %name, "ignored column is not part of the plan"),
        }
    }
}

/// Everything the driver needs to insert rows, built before any page fetch.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub columns: ColumnPlan,
    pub additional: Vec<AdditionalField>,
    /// Insert field list: plan targets in order, then additional fields.
    pub fields: Vec<String>,
}

impl ImportPlan {
    /// Resolve, validate, exclude and collect insert fields.
    pub fn build(
        header: Option<&[String]>,
        mapping: &Spec,
        ignored: &[String],
        additional: Vec<AdditionalField>,
        owner: &str,
    ) -> ConfigResult<Self> {
        let resolved = resolve(header, mapping, owner)?;
        let mut columns = validate(resolved, owner)?;
        exclude_ignored(&mut columns, ignored);

        if columns.active_len() == 0 {
            return Err(ConfigError::NothingToImport {
                owner: owner.to_string(),
            });
        }

        let fields = insert_fields(&columns, &additional)?;
        debug!(owner, fields = ?fields, "column plan ready");

        Ok(Self {
            columns,
            additional,
            fields,
        })
    }

    /// JSON summary used by the `plan` command.
    pub fn describe(&self) -> Value {
        let additional: Vec<Value> = self
            .additional
            .iter()
            .map(|f| match &f.value {
                FieldValue::Constant(v) => json!({"field": f.name, "constant": v}),
                FieldValue::Computed(_) => json!({"field": f.name, "computed": true}),
            })
            .collect();
        json!({
            "columns": self.columns.describe(),
            "additional_fields": additional,
            "insert_fields": self.fields,
        })
    }
}

/// Plan targets followed by additional field names. Each destination field
/// may be written once.
pub fn insert_fields(columns: &ColumnPlan, additional: &[AdditionalField]) -> ConfigResult<Vec<String>> {
    let mut seen = HashSet::new();
    columns
        .target_fields()
        .into_iter()
        .chain(additional.iter().map(|f| f.name.clone()))
        .map(|field| {
            if seen.insert(field.clone()) {
                Ok(field)
            } else {
                Err(ConfigError::DuplicateTarget(field))
            }
        })
        .collect()
}
