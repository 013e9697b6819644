//! Column resolution.
//!
//! Merges the header row and the declared mapping into one ordered list of
//! raw `(key, spec)` pairs. Shapes are not checked here; that is the
//! validator's job.

use tracing::debug;

use super::ColumnKey;
use crate::error::{ConfigError, ConfigResult};
use crate::mapping::Spec;

/// Resolved but unvalidated columns, in binding order.
pub type ResolvedColumns = Vec<(ColumnKey, Spec)>;

/// Merge header-derived identity entries with the declared mapping.
///
/// Header names are trimmed and seeded as `name -> name`; each must be
/// non-empty and unique so rows stay positionally aligned. Keyed declared
/// entries replace a header entry with the same key in place, or are
/// appended. Positional (list) entries are always appended.
pub fn resolve(header: Option<&[String]>, declared: &Spec, owner: &str) -> ConfigResult<ResolvedColumns> {
    let mut columns: ResolvedColumns = Vec::new();

    if let Some(header) = header {
        for (position, name) in header.iter().enumerate() {
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::BlankHeaderColumn {
                    position: position + 1,
                    owner: owner.to_string(),
                });
            }
            let key = ColumnKey::Name(name.to_string());
            if columns.iter().any(|(k, _)| *k == key) {
                return Err(ConfigError::DuplicateColumn {
                    column: name.to_string(),
                    owner: owner.to_string(),
                });
            }
            columns.push((key, Spec::Text(name.to_string())));
        }
        debug!(columns = columns.len(), "seeded columns from header");
    }

    match declared {
        Spec::Map(entries) => {
            for (key, spec) in entries {
                upsert(&mut columns, ColumnKey::Name(key.clone()), spec.clone());
            }
        }
        Spec::List(items) => {
            for spec in items {
                let position = columns.len();
                columns.push((ColumnKey::Position(position), spec.clone()));
            }
        }
        Spec::Null => {}
        other => {
            return Err(ConfigError::InvalidMappingEntry {
                key: "mapping".to_string(),
                kind: other.kind().to_string(),
                owner: owner.to_string(),
            })
        }
    }

    if columns.is_empty() {
        return Err(ConfigError::NoColumns {
            owner: owner.to_string(),
        });
    }

    Ok(columns)
}

fn upsert(columns: &mut ResolvedColumns, key: ColumnKey, spec: Spec) {
    match columns.iter_mut().find(|(k, _)| *k == key) {
        Some(existing) => existing.1 = spec,
        None => columns.push((key, spec)),
    }
}
