//! # Observation types and result dispatch
//!
//! A Datastream declares one of five observation types; every Observation in
//! that stream must carry a `result` of the matching shape. The dispatch is a
//! total match over [`ObservationType`]: a value of the wrong shape is
//! rejected, never coerced into another kind.
//!
//! | observationType         | accepted source      | stored as            |
//! |-------------------------|----------------------|----------------------|
//! | `OM_Measurement`        | any number           | `f64`                |
//! | `OM_CountObservation`   | integral number      | `i64`                |
//! | `OM_TruthObservation`   | boolean              | `bool`               |
//! | `OM_CategoryObservation`| URI string           | `String`             |
//! | `OM_Observation`        | any string           | `String`             |

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::document::{exact_i64, is_valid_uri, value_type};
use crate::{Document, InvalidError};

/// Field carrying an observation's result.
pub const RESULT_FIELD: &str = "result";

const OM_PREFIX: &str = "http://www.opengis.net/def/observationType/OGC-OM/2.0/";

/////////////////////////////////////////// ObservationType ////////////////////////////////////////////

/// The five result encodings a Datastream may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationType {
    Measurement,
    CountObservation,
    TruthObservation,
    CategoryObservation,
    Observation,
}

impl ObservationType {
    /// Every supported observation type.
    pub const ALL: [ObservationType; 5] = [
        ObservationType::Measurement,
        ObservationType::CountObservation,
        ObservationType::TruthObservation,
        ObservationType::CategoryObservation,
        ObservationType::Observation,
    ];

    /// The `OM_*` suffix of the type's URI.
    pub fn code(self) -> &'static str {
        match self {
            ObservationType::Measurement => "OM_Measurement",
            ObservationType::CountObservation => "OM_CountObservation",
            ObservationType::TruthObservation => "OM_TruthObservation",
            ObservationType::CategoryObservation => "OM_CategoryObservation",
            ObservationType::Observation => "OM_Observation",
        }
    }

    /// The full URI identifying this type.
    pub fn uri(self) -> String {
        format!("{}{}", OM_PREFIX, self.code())
    }
}

impl Display for ObservationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}{}", OM_PREFIX, self.code())
    }
}

impl FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(OM_PREFIX)
            .and_then(|code| Self::ALL.into_iter().find(|t| t.code() == code))
            .ok_or_else(|| format!("{:?} is not a supported observationType", s))
    }
}

impl Serialize for ObservationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObservationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

////////////////////////////////////////// ObservationResult ///////////////////////////////////////////

/// The single typed result of an observation.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationResult {
    Measurement(f64),
    Count(i64),
    Truth(bool),
    Category(String),
    Text(String),
}

impl ObservationResult {
    /// The observation type this result belongs to.
    pub fn observation_type(&self) -> ObservationType {
        match self {
            ObservationResult::Measurement(_) => ObservationType::Measurement,
            ObservationResult::Count(_) => ObservationType::CountObservation,
            ObservationResult::Truth(_) => ObservationType::TruthObservation,
            ObservationResult::Category(_) => ObservationType::CategoryObservation,
            ObservationResult::Text(_) => ObservationType::Observation,
        }
    }

    /// Converts a raw JSON value under the contract of `observation_type`.
    ///
    /// Returns the reason for rejection so callers can attach their own context.
    pub fn from_value(observation_type: ObservationType, value: &Value) -> Result<Self, String> {
        let mismatch = || {
            format!(
                "{} requires {}, got {}",
                observation_type.code(),
                expected_shape(observation_type),
                value_type(value)
            )
        };
        match (observation_type, value) {
            (ObservationType::Measurement, Value::Number(n)) => n
                .as_f64()
                .map(ObservationResult::Measurement)
                .ok_or_else(mismatch),
            (ObservationType::CountObservation, Value::Number(_)) => exact_i64(value)
                .map(ObservationResult::Count)
                .ok_or_else(mismatch),
            (ObservationType::TruthObservation, Value::Bool(b)) => {
                Ok(ObservationResult::Truth(*b))
            }
            (ObservationType::CategoryObservation, Value::String(s)) => {
                if is_valid_uri(s) {
                    Ok(ObservationResult::Category(s.clone()))
                } else {
                    Err(format!(
                        "OM_CategoryObservation requires a URI, {:?} is not one",
                        s
                    ))
                }
            }
            (ObservationType::Observation, Value::String(s)) => {
                Ok(ObservationResult::Text(s.clone()))
            }
            _ => Err(mismatch()),
        }
    }

    /// The result as the JSON scalar it is serialized to.
    pub fn to_value(&self) -> Value {
        match self {
            ObservationResult::Measurement(v) => serde_json::json!(v),
            ObservationResult::Count(v) => Value::from(*v),
            ObservationResult::Truth(v) => Value::Bool(*v),
            ObservationResult::Category(s) | ObservationResult::Text(s) => Value::String(s.clone()),
        }
    }
}

fn expected_shape(observation_type: ObservationType) -> &'static str {
    match observation_type {
        ObservationType::Measurement => "a number",
        ObservationType::CountObservation => "an integral number",
        ObservationType::TruthObservation => "a boolean",
        ObservationType::CategoryObservation => "a URI string",
        ObservationType::Observation => "a string",
    }
}

impl Serialize for ObservationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ObservationResult::Measurement(v) => serializer.serialize_f64(*v),
            ObservationResult::Count(v) => serializer.serialize_i64(*v),
            ObservationResult::Truth(v) => serializer.serialize_bool(*v),
            ObservationResult::Category(s) | ObservationResult::Text(s) => {
                serializer.serialize_str(s)
            }
        }
    }
}

/// Extracts the required `result` field of `doc` under `observation_type`.
pub fn extract_result(
    observation_type: ObservationType,
    doc: &Document<'_>,
) -> Result<ObservationResult, InvalidError> {
    let value = doc.require(RESULT_FIELD)?;
    ObservationResult::from_value(observation_type, value)
        .map_err(|reason| InvalidError::field(RESULT_FIELD, reason, doc))
}

/// Like [`extract_result`], but absence yields `None` instead of an error.
pub fn extract_optional_result(
    observation_type: ObservationType,
    doc: &Document<'_>,
) -> Result<Option<ObservationResult>, InvalidError> {
    if doc.contains(RESULT_FIELD) {
        extract_result(observation_type, doc).map(Some)
    } else {
        Ok(None)
    }
}
