//! Loaded manifests.

use std::collections::BTreeMap;

use crate::hash::ContentHash;

/// A manifest as fetched, with the artifacts it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManifest {
    /// The manifest exactly as downloaded.
    pub bytes: Vec<u8>,
    /// Module id to content hash.
    pub modules: BTreeMap<String, ContentHash>,
    /// When the manifest was last confirmed to be the freshest available.
    pub fresh_at_epoch_ms: i64,
}

impl LoadedManifest {
    pub fn new(bytes: impl Into<Vec<u8>>, fresh_at_epoch_ms: i64) -> Self {
        Self { bytes: bytes.into(), modules: BTreeMap::new(), fresh_at_epoch_ms }
    }

    pub fn module(mut self, id: impl Into<String>, sha256: ContentHash) -> Self {
        self.modules.insert(id.into(), sha256);
        self
    }

    pub fn hash(&self) -> ContentHash {
        ContentHash::of(&self.bytes)
    }

    /// Same manifest content, regardless of freshness.
    pub fn same_content(&self, other: &LoadedManifest) -> bool {
        self.bytes == other.bytes
    }
}
