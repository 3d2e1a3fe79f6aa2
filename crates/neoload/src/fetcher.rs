//! # Fetchers
//!
//! A `Fetcher` produces the bytes of one artifact. Fetchers compose: the
//! `CachingFetcher` wraps a network fetcher and only calls it on a cache miss.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use futures::FutureExt;

use crate::cache::Cache;
use crate::error::Error;
use crate::error::Result;
use crate::hash::ContentHash;
use crate::manifest::LoadedManifest;

/// Everything a fetcher needs to locate and verify one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub application_name: String,
    pub id: String,
    pub sha256: ContentHash,
    pub now_epoch_ms: i64,
    pub base_url: Option<String>,
    pub url: String,
}

impl FetchRequest {
    pub fn new(application_name: impl Into<String>, id: impl Into<String>, sha256: ContentHash, url: impl Into<String>) -> Self {
        Self {
            application_name: application_name.into(),
            id: id.into(),
            sha256,
            now_epoch_ms: 0,
            base_url: None,
            url: url.into(),
        }
    }

    pub fn at(mut self, now_epoch_ms: i64) -> Self {
        self.now_epoch_ms = now_epoch_ms;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// `url` resolved against `base_url` when it is relative.
    pub fn resolved_url(&self) -> String {
        match &self.base_url {
            Some(base) if !self.url.contains("://") => {
                format!("{}/{}", base.trim_end_matches('/'), self.url.trim_start_matches('/'))
            }
            _ => self.url.clone(),
        }
    }
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync + 'static {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>>;
}

/// Loader lifecycle hooks. Every hook defaults to a no-op.
pub trait LoaderEventListener: Send + Sync + 'static {
    /// An artifact was served from the cache without downloading.
    fn cache_hit(&self, _application_name: &str, _url: &str, _size: u64) {}

    /// An artifact was downloaded by the delegate fetcher.
    fn downloaded(&self, _application_name: &str, _url: &str, _size: u64) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLoaderListener;

impl LoaderEventListener for NoopLoaderListener {}

/// Fetches through a cache, calling the delegate only on a miss.
pub struct CachingFetcher {
    cache: Arc<dyn Cache>,
    delegate: Arc<dyn Fetcher>,
    listener: Arc<dyn LoaderEventListener>,
}

impl CachingFetcher {
    pub fn new(cache: Arc<dyn Cache>, delegate: Arc<dyn Fetcher>) -> Self {
        Self { cache, delegate, listener: Arc::new(NoopLoaderListener) }
    }

    pub fn with_listener(mut self, listener: Arc<dyn LoaderEventListener>) -> Self {
        self.listener = listener;
        self
    }

    pub async fn load_pinned_manifest(&self, application_name: &str, now_epoch_ms: i64) -> Option<LoadedManifest> {
        self.cache.get_pinned_manifest(application_name, now_epoch_ms).await
    }

    /// Permits every artifact of `application_name` not in `manifest` to be pruned.
    pub async fn pin(&self, application_name: &str, manifest: &LoadedManifest, now_epoch_ms: i64) -> Result<()> {
        self.cache.pin_manifest(application_name, manifest, now_epoch_ms).await
    }

    /// Removes the pins `manifest` holds for `application_name`.
    pub async fn unpin(&self, application_name: &str, manifest: &LoadedManifest, now_epoch_ms: i64) -> Result<()> {
        self.cache.unpin_manifest(application_name, manifest, now_epoch_ms).await
    }

    /// Records that `manifest` is still the freshest one available.
    pub async fn update_fresh_at(&self, application_name: &str, manifest: &LoadedManifest, now_epoch_ms: i64) -> Result<()> {
        self.cache.update_manifest_fresh_at(application_name, manifest, now_epoch_ms).await
    }
}

#[async_trait::async_trait]
impl Fetcher for CachingFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>> {
        let downloaded = AtomicBool::new(false);
        let producer = async {
            downloaded.store(true, Ordering::Release);
            self.delegate.fetch(request).await
        }
        .boxed();

        let content = self
            .cache
            .get_or_put(&request.application_name, &request.sha256, request.now_epoch_ms, producer)
            .await?;

        let size = content.len() as u64;
        if downloaded.load(Ordering::Acquire) {
            self.listener.downloaded(&request.application_name, &request.url, size);
        } else {
            tracing::debug!(app = %request.application_name, url = %request.url, size, "cache hit");
            self.listener.cache_hit(&request.application_name, &request.url, size);
        }
        Ok(content)
    }
}

/// Serves artifacts from memory by resolved URL.
#[derive(Default)]
pub struct StaticFetcher {
    content: DashMap<String, Vec<u8>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.content.insert(url.into(), content.into());
    }
}

#[async_trait::async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<u8>> {
        let url = request.resolved_url();
        self.content
            .get(&url)
            .map(|e| e.value().clone())
            .ok_or(Error::NotFound(url))
    }
}
