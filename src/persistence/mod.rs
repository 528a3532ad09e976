// ============================================================================
// Persistence Facade
// ============================================================================
//
// Entity-bearing actors read and update entities by id. Storage design is
// out of scope; `JsonEntityStore` keeps serialized documents in memory.
//
// ============================================================================

mod entities;

pub use entities::{EntitiesPersistedInDatabase, EntityId, JsonEntityStore, PersistenceError};
