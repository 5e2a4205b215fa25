//! # Typed access to untyped documents
//!
//! Creation and update documents arrive as arbitrary JSON trees. [`Document`]
//! wraps one JSON object and exposes typed accessors that all share one
//! contract:
//!
//! - `Ok(None)`: the field is absent (or explicitly `null`)
//! - `Ok(Some(value))`: the field is present and has the expected shape
//! - `Err(InvalidError)`: the field is present with the wrong shape
//!
//! Absence is never an error at this layer; callers that need a field use
//! [`Document::require`] or [`Document::require_all`].
//!
//! ```rust
//! use sensorthings::Document;
//! use serde_json::json;
//!
//! let value = json!({"name": "thermometer", "count": 3});
//! let doc = Document::new(&value).unwrap();
//! assert_eq!(doc.string("name").unwrap(), Some("thermometer".to_string()));
//! assert_eq!(doc.string("description").unwrap(), None);
//! assert!(doc.string("count").is_err());
//! ```

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::temporal::{parse_instant, parse_interval, parse_interval_or_instant};
use crate::{InvalidError, TimeInterval, TimeValue};

/// Key carrying an entity identifier, both on entities and on references.
pub const ID_KEY: &str = "@iot.id";

/// A borrowed JSON object with typed, presence-aware accessors.
#[derive(Debug, Clone, Copy)]
pub struct Document<'a> {
    object: &'a Map<String, Value>,
}

impl<'a> Document<'a> {
    /// Wraps `value`, which must be a JSON object.
    pub fn new(value: &'a Value) -> Result<Self, InvalidError> {
        match value {
            Value::Object(object) => Ok(Document { object }),
            _ => Err(InvalidError::document(
                format!("expected an object, got {}", value_type(value)),
                value,
            )),
        }
    }

    /// Wraps an already-extracted map.
    pub fn from_map(object: &'a Map<String, Value>) -> Self {
        Document { object }
    }

    /// The raw value for `field`, treating JSON `null` as absent.
    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.object.get(field).filter(|v| !v.is_null())
    }

    /// True when `field` is present and not `null`.
    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Field names present in the document, in document order.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        self.object.keys().map(String::as_str)
    }

    /// Fails naming `field` when it is absent.
    pub fn require(&self, field: &str) -> Result<&'a Value, InvalidError> {
        self.get(field)
            .ok_or_else(|| InvalidError::missing(field, self))
    }

    /// Fails naming the first of `fields` that is absent.
    pub fn require_all(&self, fields: &[&str]) -> Result<(), InvalidError> {
        for field in fields {
            self.require(field)?;
        }
        Ok(())
    }

    pub(crate) fn mismatch(&self, field: &str, expected: &str, actual: &Value) -> InvalidError {
        InvalidError::field(
            field,
            format!("expected {}, got {}", expected, value_type(actual)),
            self,
        )
    }

    /////////////////////////////////////////// scalars ////////////////////////////////////////////

    pub fn string(&self, field: &str) -> Result<Option<String>, InvalidError> {
        self.str(field).map(|s| s.map(str::to_string))
    }

    pub fn str(&self, field: &str) -> Result<Option<&'a str>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.mismatch(field, "a string", other)),
        }
    }

    pub fn bool(&self, field: &str) -> Result<Option<bool>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.mismatch(field, "a boolean", other)),
        }
    }

    /// Any JSON number, widened to `f64`.
    pub fn f64(&self, field: &str) -> Result<Option<f64>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.mismatch(field, "a finite number", &Value::Number(n.clone()))),
            Some(other) => Err(self.mismatch(field, "a number", other)),
        }
    }

    /// A JSON number that is exactly integral and fits in an `i64`.
    pub fn i64(&self, field: &str) -> Result<Option<i64>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(value @ Value::Number(_)) => exact_i64(value)
                .map(Some)
                .ok_or_else(|| self.mismatch(field, "an integral number", value)),
            Some(other) => Err(self.mismatch(field, "an integral number", other)),
        }
    }

    /// An absolute URI.
    pub fn uri(&self, field: &str) -> Result<Option<String>, InvalidError> {
        match self.str(field)? {
            None => Ok(None),
            Some(s) if is_valid_uri(s) => Ok(Some(s.to_string())),
            Some(s) => Err(InvalidError::field(
                field,
                format!("{:?} is not a valid URI", s),
                self,
            )),
        }
    }

    pub fn uuid(&self, field: &str) -> Result<Option<Uuid>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s).map(Some).map_err(|_| {
                InvalidError::field(field, format!("{:?} is not a valid UUID", s), self)
            }),
            Some(other) => Err(self.mismatch(field, "a UUID string", other)),
        }
    }

    /// Any string field parsed through `T::from_str`, used for enumerations.
    pub fn parse<T: FromStr>(&self, field: &str) -> Result<Option<T>, InvalidError>
    where
        T::Err: Display,
    {
        match self.str(field)? {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|e: T::Err| InvalidError::field(field, e.to_string(), self)),
        }
    }

    ///////////////////////////////////////////// time /////////////////////////////////////////////

    pub fn instant(&self, field: &str) -> Result<Option<DateTime<Utc>>, InvalidError> {
        self.time_with(field, parse_instant)
    }

    pub fn interval(&self, field: &str) -> Result<Option<TimeInterval>, InvalidError> {
        self.time_with(field, parse_interval)
    }

    pub fn time(&self, field: &str) -> Result<Option<TimeValue>, InvalidError> {
        self.time_with(field, parse_interval_or_instant)
    }

    fn time_with<T, E: Display>(
        &self,
        field: &str,
        parse: impl Fn(&str) -> Result<T, E>,
    ) -> Result<Option<T>, InvalidError> {
        match self.str(field)? {
            None => Ok(None),
            Some(s) => parse(s)
                .map(Some)
                .map_err(|e| InvalidError::field(field, e.to_string(), self)),
        }
    }

    ////////////////////////////////////////// composites //////////////////////////////////////////

    pub fn object(&self, field: &str) -> Result<Option<Document<'a>>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Object(object)) => Ok(Some(Document { object })),
            Some(other) => Err(self.mismatch(field, "an object", other)),
        }
    }

    pub fn array(&self, field: &str) -> Result<Option<&'a [Value]>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items.as_slice())),
            Some(other) => Err(self.mismatch(field, "an array", other)),
        }
    }

    /// A flat object whose values are all strings.
    pub fn string_map(&self, field: &str) -> Result<Option<BTreeMap<String, String>>, InvalidError> {
        let Some(object) = self.object(field)? else {
            return Ok(None);
        };
        let mut map = BTreeMap::new();
        for (key, value) in object.object {
            match value {
                Value::String(s) => {
                    map.insert(key.clone(), s.clone());
                }
                other => {
                    return Err(self.mismatch(&format!("{}/{}", field, key), "a string", other));
                }
            }
        }
        Ok(Some(map))
    }

    /// A related-entity reference, `{"@iot.id": "<uuid>"}`, reduced to its identifier.
    pub fn reference(&self, field: &str) -> Result<Option<Uuid>, InvalidError> {
        match self.get(field) {
            None => Ok(None),
            Some(value) => reference_id(field, value, self).map(Some),
        }
    }

    /// An array of related-entity references.
    pub fn references(&self, field: &str) -> Result<Option<Vec<Uuid>>, InvalidError> {
        let Some(items) = self.array(field)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| reference_id(field, item, self))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    /// The document's own identifier, if the client supplied one.
    pub fn id(&self) -> Result<Option<Uuid>, InvalidError> {
        self.uuid(ID_KEY)
    }
}

impl Display for Document<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match serde_json::to_string(self.object) {
            Ok(s) => write!(f, "{}", s),
            Err(_) => write!(f, "<unrenderable document>"),
        }
    }
}

fn reference_id(field: &str, value: &Value, doc: &Document<'_>) -> Result<Uuid, InvalidError> {
    let Value::Object(object) = value else {
        return Err(doc.mismatch(field, "a reference object", value));
    };
    if object.len() != 1 || !object.contains_key(ID_KEY) {
        return Err(InvalidError::field(
            field,
            format!("a reference must carry exactly one {} key", ID_KEY),
            doc,
        ));
    }
    let reference = Document { object };
    match reference.uuid(ID_KEY) {
        Ok(Some(id)) => Ok(id),
        Ok(None) => Err(InvalidError::missing(format!("{}/{}", field, ID_KEY), doc)),
        Err(e) => Err(InvalidError::field(field, e.reason, doc)),
    }
}

/// Describes a JSON value's shape for diagnostics.
pub fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Exact-integral decoding: integers, and floats with no fractional part that fit an `i64`.
pub fn exact_i64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    if n.is_u64() {
        return None;
    }
    let f = n.as_f64()?;
    // 2^63 is exactly representable; anything at or beyond it overflows.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// True for syntactically valid absolute URIs.
pub fn is_valid_uri(s: &str) -> bool {
    !s.chars().any(char::is_whitespace) && Url::parse(s).is_ok()
}
