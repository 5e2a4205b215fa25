//! # Data Storage Abstraction
//!
//! The validation core never touches a persistence engine directly. It calls
//! through the [`DataStore`] trait, which an outer layer implements over
//! whatever engine it owns. Each call is an opaque unit of work: the core does
//! not retry, and a `NotFound` from the store is passed through unchanged.
//!
//! ## Implementations
//!
//! - **InMemoryDataStore**: Thread-safe in-memory storage using `Mutex<HashMap>`,
//!   used by the loader binary and the test suite.
//!
//! ## Usage Examples
//!
//! ```rust
//! use sensorthings::{DataStore, Entity, EntityKind, InMemoryDataStore, ObservedProperty};
//! use uuid::Uuid;
//!
//! let store = InMemoryDataStore::new();
//! let property = ObservedProperty {
//!     id: Uuid::new_v4(),
//!     name: "air temperature".to_string(),
//!     definition: "http://dbpedia.org/page/Temperature".to_string(),
//!     description: "temperature of the air".to_string(),
//! };
//! store.insert(property.clone().into()).unwrap();
//!
//! let found = store.find_one(EntityKind::ObservedProperty, property.id).unwrap();
//! assert_eq!(found, Entity::ObservedProperty(property));
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use crate::{DataStoreError, Entity, EntityKind, EntityRecord};

/// Persistence collaborator for the entity graph.
///
/// Implementors must be safe to share across threads; the core holds stores
/// behind `Arc<dyn DataStore>` or generic `S: DataStore` parameters.
pub trait DataStore: Send + Sync {
    /// Stores `entity`, failing if its identifier is already taken.
    ///
    /// # Returns
    /// * `Ok(Entity)` - The stored entity
    /// * `Err(DataStoreError::AlreadyExists)` - An entity of that kind and id exists
    fn insert(&self, entity: Entity) -> Result<Entity, DataStoreError>;

    /// Stores `entity`, replacing any entity with the same kind and id.
    fn save(&self, entity: Entity) -> Result<Entity, DataStoreError>;

    /// Retrieves one entity.
    ///
    /// # Returns
    /// * `Ok(Entity)` - The entity
    /// * `Err(DataStoreError::NotFound)` - No entity of that kind has that id
    fn find_one(&self, kind: EntityKind, id: Uuid) -> Result<Entity, DataStoreError>;

    /// Removes one entity; `Ok(false)` when it did not exist.
    fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, DataStoreError>;

    /// Lists every entity of `kind`, in no particular order.
    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, DataStoreError>;
}

/// Retrieves and unwraps an entity of a statically known kind.
pub fn find<E: EntityRecord>(store: &dyn DataStore, id: Uuid) -> Result<E, DataStoreError> {
    let entity = store.find_one(E::KIND, id)?;
    E::try_from(entity).map_err(|other| {
        DataStoreError::Internal(format!(
            "store returned a {} when asked for {} {}",
            other.kind(),
            E::KIND,
            id
        ))
    })
}

/// Checks that `id` names an existing entity of `kind`.
pub fn ensure_exists(store: &dyn DataStore, kind: EntityKind, id: Uuid) -> Result<(), DataStoreError> {
    store.find_one(kind, id).map(|_| ())
}

////////////////////////////////////////// InMemoryDataStore ///////////////////////////////////////////

#[derive(Debug, Default)]
pub struct InMemoryDataStore {
    entities: Mutex<HashMap<(EntityKind, Uuid), Entity>>,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of every kind.
    pub fn len(&self) -> usize {
        self.lock().map(|entities| entities.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<(EntityKind, Uuid), Entity>>, DataStoreError> {
        self.entities
            .lock()
            .map_err(|_| DataStoreError::Internal("entity map lock poisoned".to_string()))
    }
}

impl DataStore for InMemoryDataStore {
    fn insert(&self, entity: Entity) -> Result<Entity, DataStoreError> {
        let mut entities = self.lock()?;
        let key = (entity.kind(), entity.id());
        if entities.contains_key(&key) {
            return Err(DataStoreError::AlreadyExists {
                kind: key.0,
                id: key.1,
            });
        }
        entities.insert(key, entity.clone());
        Ok(entity)
    }

    fn save(&self, entity: Entity) -> Result<Entity, DataStoreError> {
        let mut entities = self.lock()?;
        entities.insert((entity.kind(), entity.id()), entity.clone());
        Ok(entity)
    }

    fn find_one(&self, kind: EntityKind, id: Uuid) -> Result<Entity, DataStoreError> {
        let entities = self.lock()?;
        entities
            .get(&(kind, id))
            .cloned()
            .ok_or(DataStoreError::NotFound { kind, id })
    }

    fn delete(&self, kind: EntityKind, id: Uuid) -> Result<bool, DataStoreError> {
        let mut entities = self.lock()?;
        Ok(entities.remove(&(kind, id)).is_some())
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>, DataStoreError> {
        let entities = self.lock()?;
        Ok(entities
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, e)| e.clone())
            .collect())
    }
}
