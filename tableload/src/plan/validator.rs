//! Mapping validation.
//!
//! Classifies every resolved `(key, spec)` pair into a [`ColumnBinding`]:
//!
//! | key      | value                     | binding                         |
//! |----------|---------------------------|---------------------------------|
//! | position | string `v`                | `v -> v`                        |
//! | name `k` | string `v`                | `k -> v`                        |
//! | name `k` | `[target, callable]`      | `k -> target`, transformed      |
//! | name `k` | callable                  | `k -> k`, transformed           |
//! | anything else                        || rejected                        |

use super::resolver::ResolvedColumns;
use super::ColumnKey;
use crate::error::{ConfigError, ConfigResult};
use crate::mapping::Spec;
use crate::models::{ColumnBinding, ColumnPlan, ColumnPlanEntry};

/// Turn resolved columns into a column plan, preserving order.
///
/// A later entry for an already-planned source column replaces it in place.
pub fn validate(columns: ResolvedColumns, owner: &str) -> ConfigResult<ColumnPlan> {
    let mut plan = ColumnPlan::new();

    for (key, spec) in columns {
        plan.upsert(classify(&key, spec, owner)?);
    }

    if plan.is_empty() {
        return Err(ConfigError::NothingToImport {
            owner: owner.to_string(),
        });
    }

    Ok(plan)
}

fn classify(key: &ColumnKey, spec: Spec, owner: &str) -> ConfigResult<ColumnPlanEntry> {
    let invalid = |kind: &str| ConfigError::InvalidMappingEntry {
        key: key.to_string(),
        kind: kind.to_string(),
        owner: owner.to_string(),
    };

    match (key, spec) {
        (ColumnKey::Position(_), Spec::Text(value)) => {
            let value = value.trim();
            if value.is_empty() {
                return Err(invalid("string"));
            }
            Ok(ColumnPlanEntry::new(value, ColumnBinding::Identity))
        }
        (ColumnKey::Name(name), Spec::Text(value)) => {
            let value = value.trim();
            if value.is_empty() {
                return Err(invalid("string"));
            }
            let binding = if value == name.as_str() {
                ColumnBinding::Identity
            } else {
                ColumnBinding::Renamed(value.to_string())
            };
            Ok(ColumnPlanEntry::new(name.clone(), binding))
        }
        (ColumnKey::Name(name), Spec::List(items)) => {
            let malformed = || ConfigError::MalformedPair {
                key: name.clone(),
                owner: owner.to_string(),
            };
            let [target, transform] = <[Spec; 2]>::try_from(items).map_err(|_| malformed())?;
            let target = match target {
                Spec::Text(t) if !t.trim().is_empty() => t.trim().to_string(),
                _ => return Err(malformed()),
            };
            let transform = match transform {
                Spec::Callable(t) => t,
                _ => return Err(malformed()),
            };
            Ok(ColumnPlanEntry::new(
                name.clone(),
                ColumnBinding::Computed { target, transform },
            ))
        }
        (ColumnKey::Name(name), Spec::Callable(transform)) => Ok(ColumnPlanEntry::new(
            name.clone(),
            ColumnBinding::Computed {
                target: name.clone(),
                transform,
            },
        )),
        (_, other) => Err(invalid(other.kind())),
    }
}
