use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Time-ordered id for a new entity
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    #[error("Entity {id} could not be (de)serialized")]
    Serialization {
        id: EntityId,
        #[source]
        source: serde_json::Error,
    },
}

/// Read/update access to persisted entities
pub trait EntitiesPersistedInDatabase {
    type Entity;

    /// Fails with `EntityNotFound` when nothing was ever stored under `id`
    fn read(&self, id: EntityId) -> Result<Self::Entity, PersistenceError>;

    fn update(&mut self, id: EntityId, entity: Self::Entity) -> Result<(), PersistenceError>;
}

/// In-memory store of JSON documents; every read returns a fresh copy
#[derive(Debug)]
pub struct JsonEntityStore<V> {
    documents: HashMap<EntityId, String>,
    _entity: PhantomData<fn() -> V>,
}

impl<V> JsonEntityStore<V> {
    pub fn new() -> Self {
        Self {
            documents: HashMap::new(),
            _entity: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<V> Default for JsonEntityStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize + DeserializeOwned> EntitiesPersistedInDatabase for JsonEntityStore<V> {
    type Entity = V;

    fn read(&self, id: EntityId) -> Result<V, PersistenceError> {
        let document = self
            .documents
            .get(&id)
            .ok_or(PersistenceError::EntityNotFound(id))?;
        serde_json::from_str(document).map_err(|source| PersistenceError::Serialization { id, source })
    }

    fn update(&mut self, id: EntityId, entity: V) -> Result<(), PersistenceError> {
        let document = serde_json::to_string(&entity)
            .map_err(|source| PersistenceError::Serialization { id, source })?;
        tracing::trace!(entity_id = %id, bytes = document.len(), "Entity updated");
        self.documents.insert(id, document);
        Ok(())
    }
}
