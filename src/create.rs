//! # Entity creation
//!
//! A creation document is validated from scratch: required fields first, then
//! scalar coercion, time parsing, result dispatch and parameter seeding, and
//! finally resolution of related-entity references through the store. Only a
//! fully populated entity is returned; persisting it is the caller's job.
//!
//! ```rust
//! use chrono::Utc;
//! use sensorthings::{InMemoryDataStore, ObservedProperty, create};
//! use serde_json::json;
//!
//! let store = InMemoryDataStore::new();
//! let property: ObservedProperty = create(
//!     &json!({
//!         "name": "air temperature",
//!         "definition": "http://dbpedia.org/page/Temperature",
//!         "description": "temperature of the air",
//!     }),
//!     &store,
//!     Utc::now(),
//! )
//! .unwrap();
//! assert_eq!(property.name, "air temperature");
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::data_store::{DataStore, ensure_exists, find};
use crate::observation::{RESULT_FIELD, extract_result};
use crate::patch::merge_map_field;
use crate::{
    Datastream, Document, EntityKind, EntityRecord, Error, FeatureOfInterest, Geometry,
    HistoricalLocation, InvalidError, Location, Observation, ObservationType, ObservedProperty,
    ParameterMap, Sensor, Thing, TimeValue, UnitOfMeasurement,
};

/// Kind-specific validation of a creation document.
pub trait Create: EntityRecord {
    /// Builds a new, not-yet-persisted entity from `doc`.
    ///
    /// # Arguments
    /// * `doc` - The creation document
    /// * `store` - Used to resolve related-entity references
    /// * `now` - Server time, for fields that default to it
    fn create(doc: &Document<'_>, store: &dyn DataStore, now: DateTime<Utc>) -> Result<Self, Error>;
}

/// Validates `value` as a creation document for `E`.
pub fn create<E: Create>(value: &Value, store: &dyn DataStore, now: DateTime<Utc>) -> Result<E, Error> {
    let doc = Document::new(value)?;
    E::create(&doc, store, now)
}

/// Validates `value` as a full replacement of the entity identified by `id`.
///
/// The replacement goes through creation validation, so every required field
/// must be present again; any `@iot.id` in the document is ignored.
pub fn replacement<E: Create>(
    id: Uuid,
    value: &Value,
    store: &dyn DataStore,
    now: DateTime<Utc>,
) -> Result<E, Error> {
    let mut entity = create::<E>(value, store, now)?;
    entity.set_id(id);
    Ok(entity)
}

///////////////////////////////////////////// Extraction ///////////////////////////////////////////////

fn required<'d, T>(
    doc: &Document<'d>,
    field: &str,
    read: impl FnOnce(&Document<'d>, &str) -> Result<Option<T>, InvalidError>,
) -> Result<T, InvalidError> {
    read(doc, field)?.ok_or_else(|| InvalidError::missing(field, doc))
}

fn new_id(doc: &Document<'_>) -> Result<Uuid, InvalidError> {
    Ok(doc.id()?.unwrap_or_else(Uuid::new_v4))
}

fn resolve(store: &dyn DataStore, kind: EntityKind, id: Uuid) -> Result<Uuid, Error> {
    ensure_exists(store, kind, id)?;
    Ok(id)
}

fn resolve_all(
    doc: &Document<'_>,
    field: &str,
    kind: EntityKind,
    store: &dyn DataStore,
) -> Result<Vec<Uuid>, Error> {
    doc.references(field)?
        .unwrap_or_default()
        .into_iter()
        .map(|id| resolve(store, kind, id))
        .collect()
}

fn resolve_one(
    doc: &Document<'_>,
    field: &str,
    kind: EntityKind,
    store: &dyn DataStore,
) -> Result<Uuid, Error> {
    let id = required(doc, field, Document::reference)?;
    resolve(store, kind, id)
}

/////////////////////////////////////////////// Kinds //////////////////////////////////////////////////

impl Create for Thing {
    fn create(doc: &Document<'_>, store: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["name", "description"])?;
        let id = new_id(doc)?;
        let name = required(doc, "name", Document::string)?;
        let description = required(doc, "description", Document::string)?;
        let properties = merge_map_field(doc, "properties", &ParameterMap::new())?.unwrap_or_default();
        let location_ids = resolve_all(doc, "Locations", EntityKind::Location, store)?;
        Ok(Thing {
            id,
            name,
            description,
            properties,
            location_ids,
        })
    }
}

impl Create for Location {
    fn create(doc: &Document<'_>, store: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["name", "description", "encodingType", "location"])?;
        let id = new_id(doc)?;
        let name = required(doc, "name", Document::string)?;
        let description = required(doc, "description", Document::string)?;
        let encoding_type = required(doc, "encodingType", Document::parse)?;
        let location = required(doc, "location", Geometry::from_field)?;
        let thing_ids = resolve_all(doc, "Things", EntityKind::Thing, store)?;
        Ok(Location {
            id,
            name,
            description,
            encoding_type,
            location,
            thing_ids,
        })
    }
}

impl Create for Sensor {
    fn create(doc: &Document<'_>, _: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["name", "description", "encodingType", "metadata"])?;
        Ok(Sensor {
            id: new_id(doc)?,
            name: required(doc, "name", Document::string)?,
            description: required(doc, "description", Document::string)?,
            encoding_type: required(doc, "encodingType", Document::parse)?,
            metadata: required(doc, "metadata", Document::uri)?,
        })
    }
}

impl Create for ObservedProperty {
    fn create(doc: &Document<'_>, _: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["name", "definition", "description"])?;
        Ok(ObservedProperty {
            id: new_id(doc)?,
            name: required(doc, "name", Document::string)?,
            definition: required(doc, "definition", Document::uri)?,
            description: required(doc, "description", Document::string)?,
        })
    }
}

impl Create for FeatureOfInterest {
    fn create(doc: &Document<'_>, _: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["name", "description", "encodingType", "feature"])?;
        Ok(FeatureOfInterest {
            id: new_id(doc)?,
            name: required(doc, "name", Document::string)?,
            description: required(doc, "description", Document::string)?,
            encoding_type: required(doc, "encodingType", Document::parse)?,
            feature: required(doc, "feature", Geometry::from_field)?,
        })
    }
}

impl Create for HistoricalLocation {
    fn create(doc: &Document<'_>, store: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&["time", "Thing"])?;
        let id = new_id(doc)?;
        let time = required(doc, "time", Document::instant)?;
        let thing_id = resolve_one(doc, "Thing", EntityKind::Thing, store)?;
        let location_ids = resolve_all(doc, "Locations", EntityKind::Location, store)?;
        Ok(HistoricalLocation {
            id,
            time,
            thing_id,
            location_ids,
        })
    }
}

impl Create for Datastream {
    fn create(doc: &Document<'_>, store: &dyn DataStore, _: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&[
            "name",
            "description",
            "unitOfMeasurement",
            "observationType",
            "Thing",
            "Sensor",
            "ObservedProperty",
        ])?;
        let id = new_id(doc)?;
        let name = required(doc, "name", Document::string)?;
        let description = required(doc, "description", Document::string)?;
        let unit_of_measurement = required(doc, "unitOfMeasurement", UnitOfMeasurement::from_field)?;
        let observation_type: ObservationType = required(doc, "observationType", Document::parse)?;
        let thing_id = resolve_one(doc, "Thing", EntityKind::Thing, store)?;
        let sensor_id = resolve_one(doc, "Sensor", EntityKind::Sensor, store)?;
        let observed_property_id =
            resolve_one(doc, "ObservedProperty", EntityKind::ObservedProperty, store)?;
        Ok(Datastream {
            id,
            name,
            description,
            unit_of_measurement,
            observation_type,
            observed_area: None,
            phenomenon_time: None,
            result_time: None,
            thing_id,
            sensor_id,
            observed_property_id,
        })
    }
}

impl Create for Observation {
    fn create(doc: &Document<'_>, store: &dyn DataStore, now: DateTime<Utc>) -> Result<Self, Error> {
        doc.require_all(&[RESULT_FIELD, "Datastream"])?;
        let datastream_id = required(doc, "Datastream", Document::reference)?;
        let datastream: Datastream = find(store, datastream_id)?;
        Observation::create_in(doc, &datastream, store, now)
    }
}

impl Observation {
    /// Builds an observation for an already-resolved `datastream`.
    ///
    /// Any `Datastream` reference in `doc` is ignored. A missing
    /// `phenomenonTime` defaults to `now`; a missing `resultTime` stays absent.
    pub fn create_in(
        doc: &Document<'_>,
        datastream: &Datastream,
        store: &dyn DataStore,
        now: DateTime<Utc>,
    ) -> Result<Self, Error> {
        doc.require(RESULT_FIELD)?;
        let id = new_id(doc)?;
        let result_quality = doc.string("resultQuality")?;
        let phenomenon_time = doc
            .time("phenomenonTime")?
            .unwrap_or(TimeValue::Instant(now));
        let result_time = doc.instant("resultTime")?;
        let valid_time = doc.interval("validTime")?;
        let result = extract_result(datastream.observation_type, doc)?;
        let parameters = merge_map_field(doc, "parameters", &ParameterMap::new())?.unwrap_or_default();
        let feature_of_interest_id = doc
            .reference("FeatureOfInterest")?
            .map(|id| resolve(store, EntityKind::FeatureOfInterest, id))
            .transpose()?;
        Ok(Observation {
            id,
            phenomenon_time,
            result_time,
            valid_time,
            result_quality,
            parameters,
            result,
            datastream_id: datastream.id,
            feature_of_interest_id,
        })
    }
}
