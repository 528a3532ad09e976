use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::errors::ActorError;
use super::eventizer::Eventizer;

// ============================================================================
// Eventizer Registry - Static Contract Locator
// ============================================================================
//
// Built once at startup and handed to the runtime. Binding an actor to a
// contract that is not registered fails at bind time, never at call time.
//
// ============================================================================

#[derive(Default)]
pub struct EventizerRegistry {
    eventizers: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    contracts: Vec<&'static str>,
}

impl EventizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an eventizer. Registering the same eventizer twice keeps the last one.
    pub fn register<E: Eventizer>(mut self, eventizer: E) -> Self {
        let previous = self
            .eventizers
            .insert(TypeId::of::<E>(), Arc::new(eventizer));
        if previous.is_none() {
            self.contracts.push(E::CONTRACT);
        }
        self
    }

    /// Look up the eventizer for contract `E`
    pub fn get<E: Eventizer>(&self) -> Result<Arc<E>, ActorError> {
        self.eventizers
            .get(&TypeId::of::<E>())
            .cloned()
            .and_then(|eventizer| eventizer.downcast::<E>().ok())
            .ok_or(ActorError::UnsupportedContract {
                contract: E::CONTRACT,
            })
    }

    pub fn supports<E: Eventizer>(&self) -> bool {
        self.eventizers.contains_key(&TypeId::of::<E>())
    }

    /// Names of all registered contracts, in registration order
    pub fn contracts(&self) -> &[&'static str] {
        &self.contracts
    }
}

impl std::fmt::Debug for EventizerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventizerRegistry")
            .field("contracts", &self.contracts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CommandListenerEventizer, SuiteListenerEventizer};

    #[test]
    fn test_registered_contract_is_found() {
        let registry = EventizerRegistry::new().register(SuiteListenerEventizer);

        assert!(registry.get::<SuiteListenerEventizer>().is_ok());
        assert!(registry.supports::<SuiteListenerEventizer>());
        assert_eq!(registry.contracts(), &["SuiteListener"]);
    }

    #[test]
    fn test_unregistered_contract_is_not_supported() {
        let registry = EventizerRegistry::new().register(SuiteListenerEventizer);

        let result = registry.get::<CommandListenerEventizer>();

        assert!(matches!(
            result,
            Err(ActorError::UnsupportedContract {
                contract: "CommandListener"
            })
        ));
    }

    #[test]
    fn test_duplicate_registration_is_listed_once() {
        let registry = EventizerRegistry::new()
            .register(SuiteListenerEventizer)
            .register(SuiteListenerEventizer);

        assert_eq!(registry.contracts().len(), 1);
    }
}
