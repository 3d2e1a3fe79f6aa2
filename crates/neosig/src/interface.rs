//! # Interface Declarations
//!
//! A closed, explicit description of a capability interface and its supertypes.
//! The capability walk in `Interface::service_type` replaces runtime
//! reflection: every interface reachable through `extends` is visited once,
//! the two marker interfaces are skipped, and every remaining member is
//! canonicalized into the resulting `ServiceType`.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::Result;
use crate::member::Member;
use crate::service_type::ServiceType;

/// Baseline marker that every bridgeable service extends.
pub const SERVICE_MARKER: &str = "neobridge.Service";

/// Resource-closing marker. Closing is part of the bridge protocol, not user dispatch.
pub const CLOSEABLE_MARKER: &str = "neobridge.AutoCloseable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    name: String,
    supertypes: Vec<Arc<Interface>>,
    members: Vec<Member>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), supertypes: Vec::new(), members: Vec::new() }
    }

    /// The baseline marker interface.
    pub fn service_marker() -> Arc<Interface> {
        Arc::new(Self::new(SERVICE_MARKER).extends(Arc::new(Self::new(CLOSEABLE_MARKER))))
    }

    pub fn extends(mut self, supertype: Arc<Interface>) -> Self {
        self.supertypes.push(supertype);
        self
    }

    pub fn member(mut self, member: impl Into<Member>) -> Self {
        self.members.push(member.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> &[Arc<Interface>] {
        &self.supertypes
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn is_marker(&self) -> bool {
        self.name == SERVICE_MARKER || self.name == CLOSEABLE_MARKER
    }

    /// Computes the service type for this interface.
    ///
    /// Fails on the first unresolved type or kind conflict; no partial result is returned.
    pub fn service_type(&self) -> Result<ServiceType> {
        let mut service_type = ServiceType::new(self.name.clone());
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&Interface> = VecDeque::from([self]);

        while let Some(interface) = queue.pop_front() {
            if !seen.insert(interface.name.as_str()) {
                continue;
            }
            queue.extend(interface.supertypes.iter().map(|s| s.as_ref()));

            if interface.is_marker() {
                continue;
            }

            for member in &interface.members {
                service_type.insert(member.signature()?, member.kind())?;
            }
        }

        Ok(service_type)
    }
}
