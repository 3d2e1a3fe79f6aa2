//! # Service Types
//!
//! A `ServiceType` is the comparable shape of one service interface: its
//! fully-qualified name plus every member signature it exposes, sorted.
//! Runtime registries and the offline extractor must produce identical values
//! for the same declared interface.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::member::MemberKind;
use crate::member::Signature;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    name: String,
    functions: BTreeMap<Signature, MemberKind>,
}

impl ServiceType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), functions: BTreeMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records a member.
    ///
    /// Re-inserting a signature with the same kind is a no-op, which is how a
    /// member inherited along two paths collapses to one entry. The same
    /// signature with a different kind is rejected.
    pub fn insert(&mut self, signature: Signature, kind: MemberKind) -> Result<()> {
        match self.functions.get(&signature) {
            Some(existing) if *existing == kind => Ok(()),
            Some(existing) => Err(Error::KindConflict {
                service: self.name.clone(),
                signature: signature.into_string(),
                existing: *existing,
                incoming: kind,
            }),
            None => {
                self.functions.insert(signature, kind);
                Ok(())
            }
        }
    }

    pub fn kind_of(&self, signature: &str) -> Option<MemberKind> {
        self.functions.get(signature).copied()
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.functions.contains_key(signature)
    }

    /// Members in canonical (lexicographic) order.
    pub fn functions(&self) -> impl Iterator<Item = (&Signature, MemberKind)> {
        self.functions.iter().map(|(s, k)| (s, *k))
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        self.functions.keys()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
