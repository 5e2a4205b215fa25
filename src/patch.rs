//! # Partial updates
//!
//! A sparse document is merged into a copy of an existing entity. Every
//! recognized field that is present is validated and assigned; a field whose
//! new value equals the old one is not recorded as a change. The accumulated
//! [`ChangeSet`] decides whether the caller needs to persist anything.
//!
//! Reference fields (`{"@iot.id": ..}`) are reduced to identifiers and handed
//! back as [`Association`]s; the engine never performs the association itself.
//!
//! ```rust
//! use sensorthings::{EncodingType, Sensor, update};
//! use serde_json::json;
//! use uuid::Uuid;
//!
//! let sensor = Sensor {
//!     id: Uuid::new_v4(),
//!     name: "DHT22".to_string(),
//!     description: "humidity".to_string(),
//!     encoding_type: EncodingType::Pdf,
//!     metadata: "http://example.org/dht22.pdf".to_string(),
//! };
//! let updated = update(&sensor, &json!({"name": "DHT22 rev B"}), &()).unwrap();
//! assert!(updated.needs_persist());
//! assert_eq!(updated.entity.name, "DHT22 rev B");
//!
//! let untouched = update(&sensor, &json!({"colour": "blue"}), &()).unwrap();
//! assert!(!untouched.needs_persist());
//! ```

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::document::ID_KEY;
use crate::observation::extract_optional_result;
use crate::{
    Datastream, Document, EntityKind, EntityRecord, FeatureOfInterest, Geometry,
    HistoricalLocation, InvalidError, Location, Observation, ObservationType, ObservedProperty,
    ParameterMap, Sensor, Thing, UnitOfMeasurement, merge_parameter_object, merge_parameters,
};

////////////////////////////////////////////// ChangeSet ///////////////////////////////////////////////

/// The set of fields a patch actually changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    fields: BTreeSet<&'static str>,
}

impl ChangeSet {
    /// Assigns `value` to `slot` when present and different, recording `field`.
    pub fn assign<T: PartialEq>(&mut self, field: &'static str, slot: &mut T, value: Option<T>) {
        if let Some(value) = value
            && *slot != value
        {
            *slot = value;
            self.fields.insert(field);
        }
    }

    pub fn mark(&mut self, field: &'static str) {
        self.fields.insert(field);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().copied()
    }
}

///////////////////////////////////////////// Association //////////////////////////////////////////////

/// A reference field found in a patch, reduced to identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    /// The navigation property it was found under.
    pub field: &'static str,
    /// The kind of entity referenced.
    pub kind: EntityKind,
    /// The referenced identifiers, in document order.
    pub ids: Vec<Uuid>,
}

/////////////////////////////////////////////// Patcher ////////////////////////////////////////////////

/// Reads fields from a patch document into entity slots, tracking changes.
pub struct Patcher<'a, 'd> {
    doc: &'a Document<'d>,
    changes: ChangeSet,
    associations: Vec<Association>,
}

impl<'a, 'd> Patcher<'a, 'd> {
    fn new(doc: &'a Document<'d>) -> Self {
        Patcher {
            doc,
            changes: ChangeSet::default(),
            associations: Vec::new(),
        }
    }

    pub fn doc(&self) -> &Document<'d> {
        self.doc
    }

    pub fn assign<T: PartialEq>(&mut self, field: &'static str, slot: &mut T, value: Option<T>) {
        self.changes.assign(field, slot, value);
    }

    pub fn string(&mut self, field: &'static str, slot: &mut String) -> Result<(), InvalidError> {
        let value = self.doc.string(field)?;
        self.assign(field, slot, value);
        Ok(())
    }

    pub fn uri(&mut self, field: &'static str, slot: &mut String) -> Result<(), InvalidError> {
        let value = self.doc.uri(field)?;
        self.assign(field, slot, value);
        Ok(())
    }

    pub fn parse<T>(&mut self, field: &'static str, slot: &mut T) -> Result<(), InvalidError>
    where
        T: FromStr + PartialEq,
        T::Err: Display,
    {
        let value = self.doc.parse(field)?;
        self.assign(field, slot, value);
        Ok(())
    }

    pub fn geometry(&mut self, field: &'static str, slot: &mut Geometry) -> Result<(), InvalidError> {
        let value = Geometry::from_field(self.doc, field)?;
        self.assign(field, slot, value);
        Ok(())
    }

    /// Merges a parameter-style map; both the array and the flat object form are accepted.
    pub fn parameters(
        &mut self,
        field: &'static str,
        slot: &mut ParameterMap,
    ) -> Result<(), InvalidError> {
        let merged = merge_map_field(self.doc, field, slot)?;
        self.assign(field, slot, merged);
        Ok(())
    }

    pub fn reference(&mut self, field: &'static str, kind: EntityKind) -> Result<(), InvalidError> {
        if let Some(id) = self.doc.reference(field)? {
            self.associations.push(Association {
                field,
                kind,
                ids: vec![id],
            });
        }
        Ok(())
    }

    pub fn references(&mut self, field: &'static str, kind: EntityKind) -> Result<(), InvalidError> {
        if let Some(ids) = self.doc.references(field)? {
            self.associations.push(Association { field, kind, ids });
        }
        Ok(())
    }
}

/// Reads a map field in either accepted form and merges it into `existing`.
pub(crate) fn merge_map_field(
    doc: &Document<'_>,
    field: &str,
    existing: &ParameterMap,
) -> Result<Option<ParameterMap>, InvalidError> {
    let located = |e: InvalidError| InvalidError::field(field, e.reason, doc);
    match doc.get(field) {
        None => Ok(None),
        Some(Value::Array(updates)) => merge_parameters(existing, updates).map_err(located),
        Some(Value::Object(object)) => merge_parameter_object(existing, object).map_err(located),
        Some(other) => Err(doc.mismatch(field, "an array of single-key objects", other)),
    }
}

//////////////////////////////////////////////// Patch /////////////////////////////////////////////////

/// Kind-specific field list for the generic partial update.
pub trait Patch: EntityRecord {
    /// Extra knowledge the patch needs beyond the entity itself.
    type Context;

    fn patch(&mut self, p: &mut Patcher<'_, '_>, ctx: &Self::Context) -> Result<(), InvalidError>;

    /// Applies a resolved association; returns true when the relation changed.
    fn associate(&mut self, _association: &Association) -> bool {
        false
    }
}

/// The outcome of a successful partial update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<E> {
    pub entity: E,
    pub changes: ChangeSet,
    pub associations: Vec<Association>,
}

impl<E> Updated<E> {
    /// True when at least one field changed.
    pub fn needs_persist(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Merges the sparse document `value` into a copy of `existing`.
///
/// On failure `existing` is untouched and nothing of the document is applied.
pub fn update<E: Patch>(
    existing: &E,
    value: &Value,
    ctx: &E::Context,
) -> Result<Updated<E>, InvalidError> {
    let doc = Document::new(value)?;
    let mut draft = existing.clone();
    let mut patcher = Patcher::new(&doc);
    draft.patch(&mut patcher, ctx)?;
    let Patcher {
        changes,
        associations,
        ..
    } = patcher;
    if changes.is_empty() && associations.is_empty() {
        debug!(kind = %E::KIND, id = %existing.id(), "patch changed nothing");
    }
    Ok(Updated {
        entity: draft,
        changes,
        associations,
    })
}

fn replace_ids(slot: &mut Vec<Uuid>, ids: &[Uuid]) -> bool {
    if slot.as_slice() == ids {
        false
    } else {
        *slot = ids.to_vec();
        true
    }
}

fn replace_id(slot: &mut Uuid, ids: &[Uuid]) -> bool {
    match ids {
        [id] if id != slot => {
            *slot = *id;
            true
        }
        _ => false,
    }
}

//////////////////////////////////////////////// Kinds /////////////////////////////////////////////////

impl Patch for Thing {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.string("description", &mut self.description)?;
        p.parameters("properties", &mut self.properties)?;
        p.references("Locations", EntityKind::Location)
    }

    fn associate(&mut self, association: &Association) -> bool {
        match association.kind {
            EntityKind::Location => replace_ids(&mut self.location_ids, &association.ids),
            _ => false,
        }
    }
}

impl Patch for Location {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.string("description", &mut self.description)?;
        p.parse("encodingType", &mut self.encoding_type)?;
        p.geometry("location", &mut self.location)?;
        p.references("Things", EntityKind::Thing)
    }

    fn associate(&mut self, association: &Association) -> bool {
        match association.kind {
            EntityKind::Thing => replace_ids(&mut self.thing_ids, &association.ids),
            _ => false,
        }
    }
}

impl Patch for Sensor {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.string("description", &mut self.description)?;
        p.parse("encodingType", &mut self.encoding_type)?;
        p.uri("metadata", &mut self.metadata)
    }
}

impl Patch for ObservedProperty {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.uri("definition", &mut self.definition)?;
        p.string("description", &mut self.description)
    }
}

impl Patch for FeatureOfInterest {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.string("description", &mut self.description)?;
        p.parse("encodingType", &mut self.encoding_type)?;
        p.geometry("feature", &mut self.feature)
    }
}

impl Patch for HistoricalLocation {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        let time = p.doc().instant("time")?;
        p.assign("time", &mut self.time, time);
        p.reference("Thing", EntityKind::Thing)?;
        p.references("Locations", EntityKind::Location)
    }

    fn associate(&mut self, association: &Association) -> bool {
        match association.kind {
            EntityKind::Thing => replace_id(&mut self.thing_id, &association.ids),
            EntityKind::Location => replace_ids(&mut self.location_ids, &association.ids),
            _ => false,
        }
    }
}

impl Patch for Datastream {
    type Context = ();

    fn patch(&mut self, p: &mut Patcher<'_, '_>, _: &()) -> Result<(), InvalidError> {
        p.string("name", &mut self.name)?;
        p.string("description", &mut self.description)?;
        let unit = UnitOfMeasurement::from_field(p.doc(), "unitOfMeasurement")?;
        p.assign("unitOfMeasurement", &mut self.unit_of_measurement, unit);
        p.parse("observationType", &mut self.observation_type)?;
        p.reference("Thing", EntityKind::Thing)?;
        p.reference("Sensor", EntityKind::Sensor)?;
        p.reference("ObservedProperty", EntityKind::ObservedProperty)
    }

    fn associate(&mut self, association: &Association) -> bool {
        match association.kind {
            EntityKind::Thing => replace_id(&mut self.thing_id, &association.ids),
            EntityKind::Sensor => replace_id(&mut self.sensor_id, &association.ids),
            EntityKind::ObservedProperty => {
                replace_id(&mut self.observed_property_id, &association.ids)
            }
            _ => false,
        }
    }
}

/// Observations patch with their Datastream's type so `result` can be dispatched.
///
/// Related entities are parsed for shape but never applied, and time edits are
/// not propagated into the Datastream's derived summaries.
impl Patch for Observation {
    type Context = ObservationType;

    fn patch(&mut self, p: &mut Patcher<'_, '_>, ctx: &ObservationType) -> Result<(), InvalidError> {
        let doc = *p.doc();
        let phenomenon_time = doc.time("phenomenonTime")?;
        p.assign("phenomenonTime", &mut self.phenomenon_time, phenomenon_time);
        let result_time = doc.instant("resultTime")?;
        p.assign("resultTime", &mut self.result_time, result_time.map(Some));
        let valid_time = doc.interval("validTime")?;
        p.assign("validTime", &mut self.valid_time, valid_time.map(Some));
        let result_quality = doc.string("resultQuality")?;
        p.assign("resultQuality", &mut self.result_quality, result_quality.map(Some));
        p.parameters("parameters", &mut self.parameters)?;
        let result = extract_optional_result(*ctx, &doc)?;
        p.assign("result", &mut self.result, result);

        for field in ["Datastream", "FeatureOfInterest"] {
            if doc.reference(field)?.is_some() {
                debug!(id = %self.id, field, "observation relations are not updatable; ignoring");
            }
        }
        if doc.contains(ID_KEY) {
            debug!(id = %self.id, "ignoring {} in patch", ID_KEY);
        }
        Ok(())
    }
}
