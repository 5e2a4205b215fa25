//! # dataArray batch ingestion
//!
//! The dataArray format submits many Observations of one Datastream as a
//! column schema plus a matrix of rows:
//!
//! ```json
//! [{
//!   "Datastream": {"@iot.id": "..."},
//!   "components": ["phenomenonTime", "result", "FeatureOfInterest/id"],
//!   "dataArray@iot.count": 2,
//!   "dataArray": [
//!     ["2017-01-13T10:20:00Z", 90, "..."],
//!     ["2017-01-13T10:21:00Z", 91, "..."]
//!   ]
//! }]
//! ```
//!
//! ## Failure model
//!
//! Element-level problems (missing or unsupported components, a count that
//! disagrees with the rows, an unknown Datastream) fail the whole batch before
//! any row is processed. Row-level problems never do: the row's outcome becomes
//! [`ERROR_SENTINEL`] and ingestion continues with the next row. The output has
//! exactly one entry per input row, in input order, across all elements.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::data_store::{DataStore, find};
use crate::document::{ID_KEY, exact_i64, value_type};
use crate::{
    Datastream, Document, EntityKind, Error, InvalidError, Observation, ParameterMap, SelfLinker,
};

/// Outcome recorded for a row that failed.
pub const ERROR_SENTINEL: &str = "error";

/////////////////////////////////////////// DataArrayComponent /////////////////////////////////////////

/// A column a dataArray element may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataArrayComponent {
    PhenomenonTime,
    Result,
    Parameters,
    FeatureOfInterest,
}

impl DataArrayComponent {
    pub fn name(self) -> &'static str {
        match self {
            DataArrayComponent::PhenomenonTime => "phenomenonTime",
            DataArrayComponent::Result => "result",
            DataArrayComponent::Parameters => "parameters",
            DataArrayComponent::FeatureOfInterest => "FeatureOfInterest/id",
        }
    }

    /// The Observation field the column is written into.
    fn field(self) -> &'static str {
        match self {
            DataArrayComponent::PhenomenonTime => "phenomenonTime",
            DataArrayComponent::Result => "result",
            DataArrayComponent::Parameters => "parameters",
            DataArrayComponent::FeatureOfInterest => "FeatureOfInterest",
        }
    }
}

impl Display for DataArrayComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DataArrayComponent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentSchema::STANDARD
            .supported
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unsupported component {:?}", s))
    }
}

//////////////////////////////////////////// ComponentSchema ///////////////////////////////////////////

/// The component sets an ingestor enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSchema {
    /// Components every element and every row must carry.
    pub required: &'static [DataArrayComponent],
    /// Components an element may declare at all.
    pub supported: &'static [DataArrayComponent],
}

impl ComponentSchema {
    pub const STANDARD: ComponentSchema = ComponentSchema {
        required: &[DataArrayComponent::PhenomenonTime, DataArrayComponent::Result],
        supported: &[
            DataArrayComponent::PhenomenonTime,
            DataArrayComponent::Result,
            DataArrayComponent::Parameters,
            DataArrayComponent::FeatureOfInterest,
        ],
    };

    /// Checks the declared `components` and returns them as typed columns.
    pub fn columns(
        &self,
        components: &[String],
        element: &impl Display,
    ) -> Result<Vec<DataArrayComponent>, InvalidError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .map(|c| c.name())
            .filter(|name| !components.iter().any(|declared| declared == name))
            .collect();
        if !missing.is_empty() {
            return Err(InvalidError::field(
                "components",
                format!("missing required components: {}", missing.join(", ")),
                element,
            ));
        }
        let mut columns = Vec::with_capacity(components.len());
        for declared in components {
            let column = self
                .supported
                .iter()
                .copied()
                .find(|c| c.name() == declared)
                .ok_or_else(|| {
                    InvalidError::field(
                        "components",
                        format!("unsupported component {:?}", declared),
                        element,
                    )
                })?;
            if columns.contains(&column) {
                return Err(InvalidError::field(
                    "components",
                    format!("component {} declared twice", column),
                    element,
                ));
            }
            columns.push(column);
        }
        Ok(columns)
    }
}

impl Default for ComponentSchema {
    fn default() -> Self {
        ComponentSchema::STANDARD
    }
}

//////////////////////////////////////////// DataArrayElement //////////////////////////////////////////

/// A related-entity reference carrying nothing but the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
}

/// One element of a dataArray batch, targeting one Datastream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataArrayElement {
    #[serde(rename = "Datastream")]
    pub datastream: Reference,
    pub components: Vec<String>,
    #[serde(rename = "dataArray@iot.count", alias = "count")]
    pub count: u64,
    #[serde(rename = "dataArray")]
    pub data_array: Vec<Vec<Value>>,
}

impl DataArrayElement {
    /// Reads an element, rejecting anything that is not the expected shape.
    pub fn from_value(value: &Value) -> Result<Self, InvalidError> {
        DataArrayElement::deserialize(value)
            .map_err(|e| InvalidError::document(format!("malformed dataArray element: {}", e), value))
    }
}

/////////////////////////////////////////////// CellValue //////////////////////////////////////////////

/// A decoded dataArray cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Map(ParameterMap),
    Bool(bool),
    Long(i64),
    Double(f64),
    Text(String),
}

impl CellValue {
    /// Decodes one cell: object, then boolean, then number (integral before
    /// real), then string. `null` decodes to `None`.
    pub fn decode(value: &Value) -> Result<Option<CellValue>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Object(object) => decode_map(object).map(|m| Some(CellValue::Map(m))),
            Value::Bool(b) => Ok(Some(CellValue::Bool(*b))),
            Value::Number(n) => match exact_i64(value) {
                Some(long) => Ok(Some(CellValue::Long(long))),
                None => n
                    .as_f64()
                    .map(|d| Some(CellValue::Double(d)))
                    .ok_or_else(|| format!("number {} is not representable", n)),
            },
            Value::String(s) => Ok(Some(CellValue::Text(s.clone()))),
            Value::Array(_) => Err("a cell cannot be an array".to_string()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            CellValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect(),
            ),
            CellValue::Bool(b) => Value::Bool(*b),
            CellValue::Long(l) => Value::from(*l),
            CellValue::Double(d) => serde_json::json!(d),
            CellValue::Text(s) => Value::String(s.clone()),
        }
    }
}

fn decode_map(object: &Map<String, Value>) -> Result<ParameterMap, String> {
    let mut map = ParameterMap::new();
    for (key, value) in object {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(format!(
                    "map value for {:?} must be a scalar, got {}",
                    key,
                    value_type(value)
                ));
            }
        };
        map.insert(key.clone(), text);
    }
    Ok(map)
}

/////////////////////////////////////////// DataArrayIngestor //////////////////////////////////////////

struct PreparedElement {
    datastream: Datastream,
    columns: Vec<DataArrayComponent>,
    rows: Vec<Vec<Value>>,
}

/// Creates Observations from dataArray batches.
pub struct DataArrayIngestor<'a> {
    store: &'a dyn DataStore,
    linker: &'a dyn SelfLinker,
    schema: ComponentSchema,
}

impl<'a> DataArrayIngestor<'a> {
    pub fn new(store: &'a dyn DataStore, linker: &'a dyn SelfLinker) -> Self {
        Self::with_schema(store, linker, ComponentSchema::STANDARD)
    }

    pub fn with_schema(
        store: &'a dyn DataStore,
        linker: &'a dyn SelfLinker,
        schema: ComponentSchema,
    ) -> Self {
        Self {
            store,
            linker,
            schema,
        }
    }

    /// Ingests a request body, which must be an array of elements.
    pub fn ingest_document(&self, body: &Value) -> Result<Vec<String>, Error> {
        match body {
            Value::Array(elements) => self.ingest(elements),
            other => Err(InvalidError::document(
                format!("a dataArray batch must be an array, got {}", value_type(other)),
                other,
            )
            .into()),
        }
    }

    /// Ingests `elements` with the current time as the default phenomenonTime.
    pub fn ingest(&self, elements: &[Value]) -> Result<Vec<String>, Error> {
        self.ingest_at(elements, Utc::now())
    }

    /// Ingests `elements`.
    ///
    /// # Returns
    /// * `Ok(outcomes)` - One self link or [`ERROR_SENTINEL`] per row, in input order
    /// * `Err(Error)` - An element was invalid or its Datastream could not be resolved;
    ///   no row has been processed
    pub fn ingest_at(&self, elements: &[Value], now: DateTime<Utc>) -> Result<Vec<String>, Error> {
        let prepared = elements
            .iter()
            .map(|element| self.prepare(element))
            .collect::<Result<Vec<_>, Error>>()?;

        let mut outcomes = Vec::with_capacity(prepared.iter().map(|p| p.rows.len()).sum());
        for element in &prepared {
            debug!(
                datastream = %element.datastream.id,
                rows = element.rows.len(),
                "ingesting dataArray element"
            );
            for (index, row) in element.rows.iter().enumerate() {
                match self.ingest_row(element, row, now) {
                    Ok(link) => outcomes.push(link),
                    Err(err) => {
                        warn!(
                            datastream = %element.datastream.id,
                            row = index,
                            error = %err,
                            "dataArray row rejected"
                        );
                        outcomes.push(ERROR_SENTINEL.to_string());
                    }
                }
            }
        }
        let failed = outcomes.iter().filter(|o| *o == ERROR_SENTINEL).count();
        info!(
            rows = outcomes.len(),
            failed,
            "dataArray ingestion complete"
        );
        Ok(outcomes)
    }

    fn prepare(&self, value: &Value) -> Result<PreparedElement, Error> {
        let element = DataArrayElement::from_value(value)?;
        let columns = self.schema.columns(&element.components, value)?;
        if element.count != element.data_array.len() as u64 {
            return Err(InvalidError::field(
                "dataArray@iot.count",
                format!(
                    "declared count {} does not match {} rows",
                    element.count,
                    element.data_array.len()
                ),
                value,
            )
            .into());
        }
        let datastream: Datastream = find(self.store, element.datastream.id)?;
        Ok(PreparedElement {
            datastream,
            columns,
            rows: element.data_array,
        })
    }

    fn ingest_row(
        &self,
        element: &PreparedElement,
        row: &[Value],
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let document = self.row_document(&element.columns, row)?;
        let doc = Document::from_map(&document);
        let observation = Observation::create_in(&doc, &element.datastream, self.store, now)?;
        let id = observation.id;
        self.store.insert(observation.into())?;
        Ok(self.linker.self_link(EntityKind::Observation, id))
    }

    /// Decodes `row` against `columns` into an Observation creation document.
    fn row_document(
        &self,
        columns: &[DataArrayComponent],
        row: &[Value],
    ) -> Result<Map<String, Value>, InvalidError> {
        let rendered = Value::Array(row.to_vec());
        if row.len() != columns.len() {
            return Err(InvalidError::document(
                format!("row has {} cells but {} components", row.len(), columns.len()),
                &rendered,
            ));
        }
        let mut document = Map::new();
        for (column, cell) in columns.iter().zip(row) {
            let decoded = CellValue::decode(cell)
                .map_err(|reason| InvalidError::field(column.name(), reason, &rendered))?;
            let Some(decoded) = decoded else {
                continue;
            };
            let value = match (column, decoded) {
                (DataArrayComponent::FeatureOfInterest, CellValue::Text(id)) => {
                    let mut reference = Map::new();
                    reference.insert(ID_KEY.to_string(), Value::String(id));
                    Value::Object(reference)
                }
                (DataArrayComponent::FeatureOfInterest, other) => {
                    return Err(InvalidError::field(
                        column.name(),
                        format!("expected an identifier, got {}", value_type(&other.to_value())),
                        &rendered,
                    ));
                }
                (DataArrayComponent::Parameters, map @ CellValue::Map(_)) => map.to_value(),
                (DataArrayComponent::Parameters, other) => {
                    return Err(InvalidError::field(
                        column.name(),
                        format!("expected an object, got {}", value_type(&other.to_value())),
                        &rendered,
                    ));
                }
                (_, decoded) => decoded.to_value(),
            };
            document.insert(column.field().to_string(), value);
        }
        for required in self.schema.required {
            if !document.contains_key(required.field()) {
                return Err(InvalidError::missing(required.name(), &rendered));
            }
        }
        Ok(document)
    }
}
