//! Additional fields: destination fields with no source column.

use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::mapping::Spec;
use crate::models::{Row, Transformed, Transformer};

/// How an additional field gets its value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Constant(Value),
    Computed(Transformer),
}

/// A destination field filled per row from a constant or a transformer.
#[derive(Debug, Clone)]
pub struct AdditionalField {
    pub name: String,
    pub value: FieldValue,
}

impl AdditionalField {
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Constant(value),
        }
    }

    pub fn computed(name: impl Into<String>, transform: Transformer) -> Self {
        Self {
            name: name.into(),
            value: FieldValue::Computed(transform),
        }
    }

    /// Value for one row. Constants never reject.
    pub fn evaluate(&self, row: &Row, row_number: usize) -> Transformed {
        match &self.value {
            FieldValue::Constant(value) => Transformed::Value(value.clone()),
            FieldValue::Computed(transform) => transform.call(row, row_number),
        }
    }
}

/// Parse the additional fields option. It must be a keyed map of
/// `field -> scalar | callable`; an empty list or null means none.
pub fn parse_additional_fields(spec: &Spec, owner: &str) -> ConfigResult<Vec<AdditionalField>> {
    let entries = match spec {
        Spec::Map(entries) => entries,
        Spec::Null => return Ok(Vec::new()),
        Spec::List(items) if items.is_empty() => return Ok(Vec::new()),
        other => {
            return Err(ConfigError::AdditionalFieldsNotKeyed {
                owner: owner.to_string(),
                kind: other.kind().to_string(),
            })
        }
    };

    entries
        .iter()
        .map(|(name, value)| match value {
            Spec::Callable(t) => Ok(AdditionalField::computed(name.clone(), t.clone())),
            other => other
                .to_constant()
                .map(|v| AdditionalField::constant(name.clone(), v))
                .ok_or_else(|| ConfigError::InvalidAdditionalField {
                    field: name.clone(),
                    kind: other.kind().to_string(),
                    owner: owner.to_string(),
                }),
        })
        .collect()
}
