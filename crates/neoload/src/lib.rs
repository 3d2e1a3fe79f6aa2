//! # NeoLoad
//!
//! The loader's collaborators: fetchers that produce artifact bytes and a
//! content-addressed cache that keeps them, with pinned manifests protecting
//! the artifacts an application currently runs.

mod cache;
mod error;
mod fetcher;
mod hash;
mod manifest;

#[cfg(test)]
mod tests;

pub use crate::error::Error;
pub use crate::error::Result;

pub use crate::hash::ContentHash;
pub use crate::manifest::LoadedManifest;

pub use crate::cache::Cache;
pub use crate::cache::MemoryCache;
pub use crate::cache::Producer;

pub use crate::fetcher::CachingFetcher;
pub use crate::fetcher::FetchRequest;
pub use crate::fetcher::Fetcher;
pub use crate::fetcher::LoaderEventListener;
pub use crate::fetcher::NoopLoaderListener;
pub use crate::fetcher::StaticFetcher;
