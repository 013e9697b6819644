//! Loosely shaped configuration values.
//!
//! A [`Spec`] is what a user writes for `mapping`, `additional_fields` and
//! `ignored_columns`, before the plan validator gives it a closed shape.

use serde_json::{Number, Value};

use super::field::FieldTransform;
use crate::error::{ConfigError, ConfigResult};
use crate::models::{Row, Transformed, Transformer};

/// A configuration value: scalar, list, ordered map or callable.
#[derive(Debug, Clone)]
pub enum Spec {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    List(Vec<Spec>),
    /// Keyed entries in declaration order.
    Map(Vec<(String, Spec)>),
    Callable(Transformer),
}

impl Default for Spec {
    fn default() -> Self {
        Spec::Map(Vec::new())
    }
}

impl Spec {
    /// Ordered map from `(key, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Spec>,
        I: IntoIterator<Item = (K, V)>,
    {
        Spec::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// List from values.
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Spec>,
        I: IntoIterator<Item = V>,
    {
        Spec::List(items.into_iter().map(Into::into).collect())
    }

    /// Callable from a closure.
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&Row, usize) -> Transformed + Send + Sync + 'static,
    {
        Spec::Callable(Transformer::new(f))
    }

    /// Kind name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Spec::Null => "null",
            Spec::Bool(_) => "boolean",
            Spec::Number(_) => "number",
            Spec::Text(_) => "string",
            Spec::List(_) => "array",
            Spec::Map(_) => "map",
            Spec::Callable(_) => "callable",
        }
    }

    /// Null, empty list, empty map and empty string count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Spec::Null => true,
            Spec::Text(s) => s.is_empty(),
            Spec::List(items) => items.is_empty(),
            Spec::Map(entries) => entries.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Spec::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Transformer> {
        match self {
            Spec::Callable(t) => Some(t),
            _ => None,
        }
    }

    /// Scalar value for constant fields. Lists, maps and callables have none.
    pub fn to_constant(&self) -> Option<Value> {
        match self {
            Spec::Null => Some(Value::Null),
            Spec::Bool(b) => Some(Value::Bool(*b)),
            Spec::Number(n) => Some(Value::Number(n.clone())),
            Spec::Text(s) => Some(Value::String(s.clone())),
            _ => None,
        }
    }

    /// Build a spec from a JSON document.
    ///
    /// A top-level object becomes a [`Spec::Map`] and a top-level array a
    /// [`Spec::List`]. Objects found in value positions are compiled into
    /// callables from a [`FieldTransform`] definition whose default source
    /// column is the owning key.
    pub fn from_json(value: &Value) -> ConfigResult<Self> {
        match value {
            Value::Object(obj) => obj
                .iter()
                .map(|(key, v)| Ok((key.clone(), Self::value_from_json(key, v)?)))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Spec::Map),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| match v {
                    Value::Object(_) => Err(ConfigError::InvalidTransform {
                        key: i.to_string(),
                        message: "computed fields need a key".to_string(),
                    }),
                    other => Self::scalar_from_json(other),
                })
                .collect::<ConfigResult<Vec<_>>>()
                .map(Spec::List),
            other => Self::scalar_from_json(other),
        }
    }

    fn value_from_json(key: &str, value: &Value) -> ConfigResult<Self> {
        match value {
            Value::Object(_) => {
                let field: FieldTransform = serde_json::from_value(value.clone()).map_err(|e| {
                    ConfigError::InvalidTransform {
                        key: key.to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(Spec::Callable(field.compile(key)?))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| Self::value_from_json(key, v))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Spec::List),
            other => Self::scalar_from_json(other),
        }
    }

    fn scalar_from_json(value: &Value) -> ConfigResult<Self> {
        Ok(match value {
            Value::Null => Spec::Null,
            Value::Bool(b) => Spec::Bool(*b),
            Value::Number(n) => Spec::Number(n.clone()),
            Value::String(s) => Spec::Text(s.clone()),
            Value::Array(items) => Spec::List(
                items
                    .iter()
                    .map(Self::scalar_from_json)
                    .collect::<ConfigResult<Vec<_>>>()?,
            ),
            Value::Object(obj) => Spec::Map(
                obj.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::scalar_from_json(v)?)))
                    .collect::<ConfigResult<Vec<_>>>()?,
            ),
        })
    }
}

impl From<&str> for Spec {
    fn from(value: &str) -> Self {
        Spec::Text(value.to_string())
    }
}

impl From<String> for Spec {
    fn from(value: String) -> Self {
        Spec::Text(value)
    }
}

impl From<bool> for Spec {
    fn from(value: bool) -> Self {
        Spec::Bool(value)
    }
}

impl From<i64> for Spec {
    fn from(value: i64) -> Self {
        Spec::Number(value.into())
    }
}

impl From<Transformer> for Spec {
    fn from(value: Transformer) -> Self {
        Spec::Callable(value)
    }
}

impl From<Vec<Spec>> for Spec {
    fn from(value: Vec<Spec>) -> Self {
        Spec::List(value)
    }
}

impl From<Vec<&str>> for Spec {
    fn from(value: Vec<&str>) -> Self {
        Spec::list(value)
    }
}
