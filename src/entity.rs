//! # The sensor-observation entity graph
//!
//! Eight entity kinds make up the graph. Each kind is a plain struct holding
//! its own fields plus the identifiers of the entities it is related to;
//! [`Entity`] wraps any one of them so the store can hold them uniformly.
//!
//! ```text
//! Thing ──┬── Location ── HistoricalLocation
//!         └── Datastream ──┬── Sensor
//!                          ├── ObservedProperty
//!                          └── Observation ── FeatureOfInterest
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Document, Geometry, InvalidError, ObservationResult, ObservationType, ParameterMap,
    TimeInterval, TimeValue,
};

////////////////////////////////////////////// EntityKind //////////////////////////////////////////////

/// The kinds of entity in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Thing,
    Location,
    Sensor,
    ObservedProperty,
    Datastream,
    Observation,
    FeatureOfInterest,
    HistoricalLocation,
}

impl EntityKind {
    /// Every kind, in dependency order (referenced kinds before referencing kinds).
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Thing,
        EntityKind::Location,
        EntityKind::HistoricalLocation,
        EntityKind::Sensor,
        EntityKind::ObservedProperty,
        EntityKind::Datastream,
        EntityKind::FeatureOfInterest,
        EntityKind::Observation,
    ];

    /// The singular name, also used as the navigation property name.
    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Thing => "Thing",
            EntityKind::Location => "Location",
            EntityKind::Sensor => "Sensor",
            EntityKind::ObservedProperty => "ObservedProperty",
            EntityKind::Datastream => "Datastream",
            EntityKind::Observation => "Observation",
            EntityKind::FeatureOfInterest => "FeatureOfInterest",
            EntityKind::HistoricalLocation => "HistoricalLocation",
        }
    }

    /// The plural collection name used in resource addresses.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Thing => "Things",
            EntityKind::Location => "Locations",
            EntityKind::Sensor => "Sensors",
            EntityKind::ObservedProperty => "ObservedProperties",
            EntityKind::Datastream => "Datastreams",
            EntityKind::Observation => "Observations",
            EntityKind::FeatureOfInterest => "FeaturesOfInterest",
            EntityKind::HistoricalLocation => "HistoricalLocations",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|k| k.name() == s || k.collection() == s)
            .ok_or_else(|| format!("unknown entity kind {:?}", s))
    }
}

///////////////////////////////////////////// EncodingType /////////////////////////////////////////////

/// Encodings recognized for Location, FeatureOfInterest and Sensor payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncodingType {
    #[serde(rename = "application/geo+json")]
    GeoJson,
    #[serde(rename = "application/vnd.geo+json")]
    VndGeoJson,
    #[serde(rename = "application/pdf")]
    Pdf,
    #[serde(rename = "http://www.opengis.net/doc/IS/SensorML/2.0")]
    SensorMl,
}

impl EncodingType {
    const ALL: [EncodingType; 4] = [
        EncodingType::GeoJson,
        EncodingType::VndGeoJson,
        EncodingType::Pdf,
        EncodingType::SensorMl,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EncodingType::GeoJson => "application/geo+json",
            EncodingType::VndGeoJson => "application/vnd.geo+json",
            EncodingType::Pdf => "application/pdf",
            EncodingType::SensorMl => "http://www.opengis.net/doc/IS/SensorML/2.0",
        }
    }
}

impl Display for EncodingType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EncodingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EncodingType::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| format!("unsupported encodingType {:?}", s))
    }
}

/////////////////////////////////////////// UnitOfMeasurement //////////////////////////////////////////

/// A Datastream's unit; validated as a unit when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfMeasurement {
    pub name: String,
    pub symbol: String,
    pub definition: String,
}

impl UnitOfMeasurement {
    /// Reads the composite under `field`; every sub-field is required once the parent is present.
    pub fn from_field(doc: &Document<'_>, field: &str) -> Result<Option<Self>, InvalidError> {
        let Some(unit) = doc.object(field)? else {
            return Ok(None);
        };
        let nested = |sub: &str, e: Option<InvalidError>| {
            let path = format!("{}/{}", field, sub);
            match e {
                Some(e) => InvalidError::field(path, e.reason, doc),
                None => InvalidError::missing(path, doc),
            }
        };
        let name = unit
            .string("name")
            .map_err(|e| nested("name", Some(e)))?
            .ok_or_else(|| nested("name", None))?;
        let symbol = unit
            .string("symbol")
            .map_err(|e| nested("symbol", Some(e)))?
            .ok_or_else(|| nested("symbol", None))?;
        let definition = unit
            .uri("definition")
            .map_err(|e| nested("definition", Some(e)))?
            .ok_or_else(|| nested("definition", None))?;
        Ok(Some(UnitOfMeasurement {
            name,
            symbol,
            definition,
        }))
    }
}

/////////////////////////////////////////////// Entities ///////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thing {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "ParameterMap::is_empty")]
    pub properties: ParameterMap,
    #[serde(skip)]
    pub location_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub encoding_type: EncodingType,
    pub location: Geometry,
    #[serde(skip)]
    pub thing_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub encoding_type: EncodingType,
    pub metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservedProperty {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub definition: String,
    pub description: String,
}

/// A typed stream of observations.
///
/// `observed_area`, `phenomenon_time` and `result_time` are summaries derived
/// from the stream's observations; they are never set from a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datastream {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub unit_of_measurement: UnitOfMeasurement,
    pub observation_type: ObservationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_area: Option<Geometry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phenomenon_time: Option<TimeInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_time: Option<TimeInterval>,
    #[serde(skip)]
    pub thing_id: Uuid,
    #[serde(skip)]
    pub sensor_id: Uuid,
    #[serde(skip)]
    pub observed_property_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub phenomenon_time: TimeValue,
    pub result_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_time: Option<TimeInterval>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_quality: Option<String>,
    #[serde(skip_serializing_if = "ParameterMap::is_empty")]
    pub parameters: ParameterMap,
    pub result: ObservationResult,
    #[serde(skip)]
    pub datastream_id: Uuid,
    #[serde(skip)]
    pub feature_of_interest_id: Option<Uuid>,
}

impl Observation {
    /// The end of the phenomenon time when it is an interval.
    pub fn phenomenon_time_end(&self) -> Option<DateTime<Utc>> {
        match self.phenomenon_time {
            TimeValue::Instant(_) => None,
            TimeValue::Interval(i) => Some(i.end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOfInterest {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub encoding_type: EncodingType,
    pub feature: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalLocation {
    #[serde(rename = "@iot.id")]
    pub id: Uuid,
    pub time: DateTime<Utc>,
    #[serde(skip)]
    pub thing_id: Uuid,
    #[serde(skip)]
    pub location_ids: Vec<Uuid>,
}

//////////////////////////////////////////////// Entity ////////////////////////////////////////////////

/// Any one entity of the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Entity {
    Thing(Thing),
    Location(Location),
    Sensor(Sensor),
    ObservedProperty(ObservedProperty),
    Datastream(Datastream),
    Observation(Observation),
    FeatureOfInterest(FeatureOfInterest),
    HistoricalLocation(HistoricalLocation),
}

/// Implemented by every entity struct so generic code can reach its identity.
pub trait EntityRecord: Clone + Into<Entity> + TryFrom<Entity, Error = Entity> {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);
}

macro_rules! entity_record {
    ($($kind:ident),+ $(,)?) => {
        $(
            impl EntityRecord for $kind {
                const KIND: EntityKind = EntityKind::$kind;

                fn id(&self) -> Uuid {
                    self.id
                }

                fn set_id(&mut self, id: Uuid) {
                    self.id = id;
                }
            }

            impl From<$kind> for Entity {
                fn from(e: $kind) -> Self {
                    Entity::$kind(e)
                }
            }

            impl TryFrom<Entity> for $kind {
                type Error = Entity;

                fn try_from(e: Entity) -> Result<Self, Self::Error> {
                    match e {
                        Entity::$kind(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )+

        impl Entity {
            pub fn kind(&self) -> EntityKind {
                match self {
                    $(Entity::$kind(_) => EntityKind::$kind,)+
                }
            }

            pub fn id(&self) -> Uuid {
                match self {
                    $(Entity::$kind(e) => e.id,)+
                }
            }
        }
    };
}

entity_record!(
    Thing,
    Location,
    Sensor,
    ObservedProperty,
    Datastream,
    Observation,
    FeatureOfInterest,
    HistoricalLocation,
);
