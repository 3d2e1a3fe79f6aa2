//! # Cache
//!
//! Content-addressed storage for downloaded artifacts, plus the pinned
//! manifest of each application.
//!
//! ## Invariants
//!
//! - An entry is stored only after its content hashes to the requested key.
//! - An entry referenced by any application's pinned manifest is never pruned.
//! - Concurrent misses on the same key run the producer once.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;

use crate::error::Error;
use crate::error::Result;
use crate::hash::ContentHash;
use crate::manifest::LoadedManifest;

/// Produces content on a cache miss.
pub type Producer<'a> = BoxFuture<'a, Result<Vec<u8>>>;

#[async_trait::async_trait]
pub trait Cache: Send + Sync + 'static {
    /// Returns the content for `sha256`, running `producer` to fill a miss.
    async fn get_or_put(
        &self,
        application_name: &str,
        sha256: &ContentHash,
        now_epoch_ms: i64,
        producer: Producer<'_>,
    ) -> Result<Vec<u8>>;

    async fn get_pinned_manifest(&self, application_name: &str, now_epoch_ms: i64) -> Option<LoadedManifest>;

    /// Pins every artifact of `manifest` and releases the previous pinned manifest.
    async fn pin_manifest(&self, application_name: &str, manifest: &LoadedManifest, now_epoch_ms: i64) -> Result<()>;

    async fn unpin_manifest(&self, application_name: &str, manifest: &LoadedManifest, now_epoch_ms: i64) -> Result<()>;

    async fn update_manifest_fresh_at(
        &self,
        application_name: &str,
        manifest: &LoadedManifest,
        now_epoch_ms: i64,
    ) -> Result<()>;
}

struct Entry {
    content: Vec<u8>,
    last_used_epoch_ms: i64,
}

/// Releases a key's fill lock slot on every exit path, unless a newer slot replaced it.
struct FillSlot<'a> {
    filling: &'a DashMap<ContentHash, Arc<tokio::sync::Mutex<()>>>,
    sha256: ContentHash,
    fill: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for FillSlot<'_> {
    fn drop(&mut self) {
        self.filling.remove_if(&self.sha256, |_, fill| Arc::ptr_eq(fill, &self.fill));
    }
}

/// In-process `Cache` bounded by total content size.
pub struct MemoryCache {
    max_size: usize,
    entries: DashMap<ContentHash, Entry>,
    pins: DashMap<ContentHash, BTreeSet<String>>,
    manifests: DashMap<String, LoadedManifest>,
    filling: DashMap<ContentHash, Arc<tokio::sync::Mutex<()>>>,
}

impl MemoryCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: DashMap::new(),
            pins: DashMap::new(),
            manifests: DashMap::new(),
            filling: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total size of stored content in bytes.
    pub fn size(&self) -> usize {
        self.entries.iter().map(|e| e.value().content.len()).sum()
    }

    pub fn contains(&self, sha256: &ContentHash) -> bool {
        self.entries.contains_key(sha256)
    }

    /// Number of applications pinning `sha256`.
    pub fn pin_count(&self, sha256: &ContentHash) -> usize {
        self.pins.get(sha256).map_or(0, |apps| apps.len())
    }

    /// Evicts least-recently-used unpinned entries until the cache fits. Returns how many were evicted.
    pub fn prune(&self) -> usize {
        let mut size = self.size();
        if size <= self.max_size {
            return 0;
        }

        let mut candidates: Vec<(i64, ContentHash, usize)> = self
            .entries
            .iter()
            .filter(|e| !self.pins.contains_key(e.key()))
            .map(|e| (e.value().last_used_epoch_ms, *e.key(), e.value().content.len()))
            .collect();
        candidates.sort();

        let mut evicted = 0;
        for (_, sha256, len) in candidates {
            if size <= self.max_size {
                break;
            }
            if self.entries.remove(&sha256).is_some() {
                tracing::debug!(%sha256, len, "evicted cache entry");
                size -= len;
                evicted += 1;
            }
        }
        evicted
    }

    fn lookup(&self, sha256: &ContentHash, now_epoch_ms: i64) -> Option<Vec<u8>> {
        let mut entry = self.entries.get_mut(sha256)?;
        entry.last_used_epoch_ms = entry.last_used_epoch_ms.max(now_epoch_ms);
        Some(entry.content.clone())
    }

    fn add_pins(&self, application_name: &str, manifest: &LoadedManifest) {
        for sha256 in manifest.modules.values() {
            self.pins.entry(*sha256).or_default().insert(application_name.to_string());
        }
    }

    fn remove_pins(&self, application_name: &str, manifest: &LoadedManifest) {
        for sha256 in manifest.modules.values() {
            if let Some(mut apps) = self.pins.get_mut(sha256) {
                apps.remove(application_name);
            }
            self.pins.remove_if(sha256, |_, apps| apps.is_empty());
        }
    }
}

#[async_trait::async_trait]
impl Cache for MemoryCache {
    async fn get_or_put(
        &self,
        application_name: &str,
        sha256: &ContentHash,
        now_epoch_ms: i64,
        producer: Producer<'_>,
    ) -> Result<Vec<u8>> {
        if let Some(content) = self.lookup(sha256, now_epoch_ms) {
            return Ok(content);
        }

        let fill = self.filling.entry(*sha256).or_default().value().clone();
        let _slot = FillSlot { filling: &self.filling, sha256: *sha256, fill: fill.clone() };
        let _filling = fill.lock().await;

        // another caller may have filled it while we waited
        if let Some(content) = self.lookup(sha256, now_epoch_ms) {
            return Ok(content);
        }

        let content = producer.await?;
        let actual = ContentHash::of(&content);
        if actual != *sha256 {
            return Err(Error::Download(format!("checksum mismatch: expected {} but was {}", sha256, actual)));
        }

        // stored before the slot is released, so a late caller hits instead of refilling
        tracing::debug!(app = application_name, %sha256, len = content.len(), "stored cache entry");
        self.entries.insert(*sha256, Entry { content: content.clone(), last_used_epoch_ms: now_epoch_ms });
        self.prune();
        Ok(content)
    }

    async fn get_pinned_manifest(&self, application_name: &str, _now_epoch_ms: i64) -> Option<LoadedManifest> {
        self.manifests.get(application_name).map(|m| m.value().clone())
    }

    async fn pin_manifest(&self, application_name: &str, manifest: &LoadedManifest, _now_epoch_ms: i64) -> Result<()> {
        // pin the new artifacts first so shared ones never drop to zero
        self.add_pins(application_name, manifest);

        let previous = self.manifests.insert(application_name.to_string(), manifest.clone());
        if let Some(previous) = previous {
            let kept: BTreeSet<&ContentHash> = manifest.modules.values().collect();
            let released = LoadedManifest {
                modules: previous
                    .modules
                    .into_iter()
                    .filter(|(_, sha256)| !kept.contains(sha256))
                    .collect(),
                ..LoadedManifest::new(Vec::new(), 0)
            };
            self.remove_pins(application_name, &released);
        }

        tracing::debug!(app = application_name, modules = manifest.modules.len(), "pinned manifest");
        Ok(())
    }

    async fn unpin_manifest(&self, application_name: &str, manifest: &LoadedManifest, _now_epoch_ms: i64) -> Result<()> {
        self.remove_pins(application_name, manifest);
        self.manifests.remove_if(application_name, |_, pinned| pinned.same_content(manifest));
        tracing::debug!(app = application_name, "unpinned manifest");
        Ok(())
    }

    async fn update_manifest_fresh_at(
        &self,
        application_name: &str,
        manifest: &LoadedManifest,
        now_epoch_ms: i64,
    ) -> Result<()> {
        let mut pinned = self
            .manifests
            .get_mut(application_name)
            .ok_or_else(|| Error::Cache(format!("no pinned manifest for '{}'", application_name)))?;

        if !pinned.same_content(manifest) {
            return Err(Error::Cache(format!("'{}' has a different pinned manifest", application_name)));
        }
        pinned.fresh_at_epoch_ms = pinned.fresh_at_epoch_ms.max(now_epoch_ms);
        Ok(())
    }
}
