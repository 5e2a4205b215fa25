//! # Entity service
//!
//! [`EntityService`] ties the validation core to a [`DataStore`]: creation
//! validates and inserts, partial updates persist only when something changed,
//! replacement revalidates and overwrites, and dataArray batches are ingested
//! with per-row isolation.
//!
//! ```rust
//! use sensorthings::{EntityService, InMemoryDataStore, ServiceConfig, Thing};
//! use serde_json::json;
//!
//! let service = EntityService::new(InMemoryDataStore::new(), &ServiceConfig::default());
//! let thing: Thing = service
//!     .create(&json!({"name": "weather station", "description": "roof"}))
//!     .unwrap();
//! let updated = service.update::<Thing>(thing.id, &json!({"name": "weather station"})).unwrap();
//! assert!(!updated.needs_persist());
//! ```

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::data_store::{DataStore, ensure_exists, find};
use crate::{
    Create, DataArrayIngestor, Datastream, Entity, EntityKind, Error, FeatureOfInterest,
    HistoricalLocation, InvalidError, Location, Observation, ObservedProperty, Patch, SelfLinker,
    Sensor, ServiceConfig, ServiceRootLinker, Thing, Updated, create, replacement, update,
};

const OBSERVATION_TYPE: &str = "observationType";

/// Create, update, replace and ingest operations over one store.
pub struct EntityService<S: DataStore> {
    store: S,
    linker: ServiceRootLinker,
}

impl<S: DataStore> EntityService<S> {
    pub fn new(store: S, config: &ServiceConfig) -> Self {
        Self::with_linker(store, config.linker())
    }

    pub fn with_linker(store: S, linker: ServiceRootLinker) -> Self {
        Self { store, linker }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn linker(&self) -> &ServiceRootLinker {
        &self.linker
    }

    /// The canonical address of `entity`.
    pub fn self_link(&self, entity: &Entity) -> String {
        self.linker.self_link(entity.kind(), entity.id())
    }

    /// Validates a creation document and inserts the new entity.
    pub fn create<E: Create>(&self, value: &Value) -> Result<E, Error> {
        let entity: E = create(value, &self.store, Utc::now())?;
        self.store.insert(entity.clone().into())?;
        debug!(kind = %E::KIND, id = %entity.id(), "created");
        Ok(entity)
    }

    /// Creates an entity whose kind is only known at runtime.
    pub fn create_kind(&self, kind: EntityKind, value: &Value) -> Result<Entity, Error> {
        Ok(match kind {
            EntityKind::Thing => self.create::<Thing>(value)?.into(),
            EntityKind::Location => self.create::<Location>(value)?.into(),
            EntityKind::Sensor => self.create::<Sensor>(value)?.into(),
            EntityKind::ObservedProperty => self.create::<ObservedProperty>(value)?.into(),
            EntityKind::Datastream => self.create::<Datastream>(value)?.into(),
            EntityKind::Observation => self.create::<Observation>(value)?.into(),
            EntityKind::FeatureOfInterest => self.create::<FeatureOfInterest>(value)?.into(),
            EntityKind::HistoricalLocation => self.create::<HistoricalLocation>(value)?.into(),
        })
    }

    /// Applies a partial update to the entity identified by `id`.
    pub fn update<E: Patch<Context = ()>>(&self, id: Uuid, value: &Value) -> Result<Updated<E>, Error> {
        let existing: E = find(&self.store, id)?;
        self.apply(existing, value, &())
    }

    /// Applies a partial update to an Observation, dispatching `result` on its Datastream's type.
    pub fn update_observation(&self, id: Uuid, value: &Value) -> Result<Updated<Observation>, Error> {
        let existing: Observation = find(&self.store, id)?;
        let datastream: Datastream = find(&self.store, existing.datastream_id)?;
        self.apply(existing, value, &datastream.observation_type)
    }

    fn apply<E: Patch>(&self, existing: E, value: &Value, ctx: &E::Context) -> Result<Updated<E>, Error> {
        let mut updated = update(&existing, value, ctx)?;
        if E::KIND == EntityKind::Datastream && updated.changes.contains(OBSERVATION_TYPE) {
            self.ensure_no_observations(existing.id(), value)?;
        }
        let associations = updated.associations.clone();
        for association in &associations {
            for id in &association.ids {
                ensure_exists(&self.store, association.kind, *id)?;
            }
            if updated.entity.associate(association) {
                updated.changes.mark(association.field);
            }
        }
        if updated.needs_persist() {
            self.store.save(updated.entity.clone().into())?;
            debug!(
                kind = %E::KIND,
                id = %existing.id(),
                fields = ?updated.changes.iter().collect::<Vec<_>>(),
                "updated"
            );
        } else {
            debug!(kind = %E::KIND, id = %existing.id(), "nothing changed; not persisting");
        }
        Ok(updated)
    }

    /// Replaces the entity identified by `id` with a fully revalidated document.
    pub fn replace<E: Create>(&self, id: Uuid, value: &Value) -> Result<E, Error> {
        ensure_exists(&self.store, E::KIND, id)?;
        let entity: E = replacement(id, value, &self.store, Utc::now())?;
        if let Entity::Datastream(new) = Into::<Entity>::into(entity.clone()) {
            let old: Datastream = find(&self.store, id)?;
            if old.observation_type != new.observation_type {
                self.ensure_no_observations(id, value)?;
            }
        }
        self.store.save(entity.clone().into())?;
        debug!(kind = %E::KIND, id = %id, "replaced");
        Ok(entity)
    }

    /// Fails naming `observationType` when any Observation belongs to `datastream_id`.
    fn ensure_no_observations(&self, datastream_id: Uuid, value: &Value) -> Result<(), Error> {
        let observations = self
            .store
            .list(EntityKind::Observation)?
            .into_iter()
            .filter(|e| matches!(e, Entity::Observation(o) if o.datastream_id == datastream_id))
            .count();
        if observations > 0 {
            return Err(InvalidError::field(
                OBSERVATION_TYPE,
                format!(
                    "cannot change the observationType of a Datastream with {} observations",
                    observations
                ),
                value,
            )
            .into());
        }
        Ok(())
    }

    /// Ingests a dataArray request body, returning one outcome per row.
    pub fn ingest_data_array(&self, body: &Value) -> Result<Vec<String>, Error> {
        let outcomes = DataArrayIngestor::new(&self.store, &self.linker).ingest_document(body)?;
        info!(rows = outcomes.len(), "dataArray batch ingested");
        Ok(outcomes)
    }
}
