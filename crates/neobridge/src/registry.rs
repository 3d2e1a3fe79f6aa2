//! # Service Type Registry
//!
//! Resolves the `ServiceType` of a service instance and caches it.
//!
//! ## Philosophy
//!
//! - **Resolve Once**: The capability walk and canonicalization run the first
//!   time an interface is seen; every later bind or take is a map lookup.
//! - **Immutable Results**: Types are shared as `Arc<ServiceType>` and never
//!   change after they are computed.

use std::sync::Arc;

use dashmap::DashMap;
use neosig::ApiDump;
use neosig::Interface;
use neosig::ServiceType;

use crate::error::Result;
use crate::service::Service;

#[derive(Default)]
pub struct ServiceTypeRegistry {
    types: DashMap<String, Arc<ServiceType>>,
}

impl ServiceTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the type of a service instance.
    pub fn type_of(&self, service: &dyn Service) -> Result<Arc<ServiceType>> {
        self.type_of_interface(&service.interface())
    }

    /// Returns the type of a declared interface, keyed by its fully-qualified name.
    pub fn type_of_interface(&self, interface: &Interface) -> Result<Arc<ServiceType>> {
        if let Some(cached) = self.types.get(interface.name()) {
            return Ok(cached.value().clone());
        }

        let service_type = Arc::new(interface.service_type()?);
        let entry = self
            .types
            .entry(interface.name().to_string())
            .or_insert(service_type);
        Ok(entry.value().clone())
    }

    /// Dumps every type resolved so far in canonical order.
    pub fn api_dump(&self) -> ApiDump {
        let types: Vec<ServiceType> = self.types.iter().map(|e| e.value().as_ref().clone()).collect();
        // names are the map keys, so they cannot repeat
        ApiDump::new(types).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use neosig::FunctionDecl;
    use neosig::TypeRef;

    fn counter() -> Interface {
        Interface::new("app.Counter")
            .extends(Interface::service_marker())
            .member(FunctionDecl::new("next", TypeRef::class("kotlin.Int")))
    }

    #[test]
    fn test_registry_caches_by_interface() {
        let registry = ServiceTypeRegistry::new();
        let first = registry.type_of_interface(&counter()).unwrap();
        let second = registry.type_of_interface(&counter()).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_registry_dump_matches_offline_text() {
        let registry = ServiceTypeRegistry::new();
        registry.type_of_interface(&counter()).unwrap();

        let offline = ApiDump::parse("app.Counter\n  fun next(): kotlin.Int\n").unwrap();
        assert_eq!(registry.api_dump().to_text(), offline.to_text());
    }

    #[test]
    fn test_registry_propagates_unresolved() {
        let registry = ServiceTypeRegistry::new();
        let broken = Interface::new("app.Broken").member(FunctionDecl::new("x", TypeRef::unresolved("?")));

        assert!(registry.type_of_interface(&broken).is_err());
        assert_eq!(registry.api_dump().services().len(), 0);
    }
}
