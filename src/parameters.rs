//! String-to-string maps attached to Things (`properties`) and Observations
//! (`parameters`).
//!
//! Updates arrive as an ordered array of single-key objects. An empty string
//! value deletes the key; anything else upserts it. The existing map is never
//! touched: a new map is produced and handed back only if something changed.
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use sensorthings::merge_parameters;
//! use serde_json::json;
//!
//! let existing = BTreeMap::from([("k".to_string(), "v".to_string())]);
//! let merged = merge_parameters(&existing, &[json!({"k": ""})]).unwrap();
//! assert_eq!(merged, Some(BTreeMap::new()));
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::InvalidError;
use crate::document::value_type;

/// A string-to-string parameter map.
pub type ParameterMap = BTreeMap<String, String>;

/// Applies `updates` to a copy of `existing`.
///
/// # Returns
/// * `Ok(Some(map))` - at least one key was inserted, changed or removed
/// * `Ok(None)` - the updates left the map as it was
/// * `Err(InvalidError)` - an element was not a single-key object with a string value
pub fn merge_parameters(
    existing: &ParameterMap,
    updates: &[Value],
) -> Result<Option<ParameterMap>, InvalidError> {
    let mut merged: Option<ParameterMap> = None;
    for update in updates {
        let (key, value) = single_entry(update)?;
        let current = merged.as_ref().unwrap_or(existing);
        if value.is_empty() {
            if current.contains_key(key) {
                merged.get_or_insert_with(|| existing.clone()).remove(key);
            }
        } else if current.get(key).map(String::as_str) != Some(value) {
            merged
                .get_or_insert_with(|| existing.clone())
                .insert(key.to_string(), value.to_string());
        }
    }
    match merged {
        Some(map) if &map != existing => Ok(Some(map)),
        _ => Ok(None),
    }
}

/// Applies the entries of a flat object as if each were its own single-key update.
pub fn merge_parameter_object(
    existing: &ParameterMap,
    object: &Map<String, Value>,
) -> Result<Option<ParameterMap>, InvalidError> {
    let updates: Vec<Value> = object
        .iter()
        .map(|(k, v)| {
            let mut single = Map::new();
            single.insert(k.clone(), v.clone());
            Value::Object(single)
        })
        .collect();
    merge_parameters(existing, &updates)
}

fn single_entry(update: &Value) -> Result<(&str, &str), InvalidError> {
    let Value::Object(object) = update else {
        return Err(InvalidError::document(
            format!("parameter update must be an object, got {}", value_type(update)),
            update,
        ));
    };
    let mut entries = object.iter();
    let (Some((key, value)), None) = (entries.next(), entries.next()) else {
        return Err(InvalidError::document(
            format!(
                "parameter update must contain exactly one key, found {}",
                object.len()
            ),
            update,
        ));
    };
    match value {
        Value::String(s) => Ok((key.as_str(), s.as_str())),
        other => Err(InvalidError::field(
            key.clone(),
            format!("parameter value must be a string, got {}", value_type(other)),
            update,
        )),
    }
}
