use futures::FutureExt;

use crate::*;

fn produce(content: &'static [u8]) -> Producer<'static> {
    async move { Ok(content.to_vec()) }.boxed()
}

fn never() -> Producer<'static> {
    async { Err(Error::Download("producer ran on a hit".into())) }.boxed()
}

#[tokio::test]
async fn test_get_or_put_fills_once() {
    let cache = MemoryCache::new(1024);
    let sha256 = ContentHash::of(b"alpha");

    let first = cache.get_or_put("app", &sha256, 1, produce(b"alpha")).await.unwrap();
    let second = cache.get_or_put("app", &sha256, 2, never()).await.unwrap();

    assert_eq!(first, b"alpha");
    assert_eq!(second, b"alpha");
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_checksum_mismatch_is_not_stored() {
    let cache = MemoryCache::new(1024);
    let sha256 = ContentHash::of(b"expected");

    let err = cache.get_or_put("app", &sha256, 1, produce(b"tampered")).await.unwrap_err();
    assert!(matches!(err, Error::Download(_)));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_producer_failure_propagates() {
    let cache = MemoryCache::new(1024);
    let sha256 = ContentHash::of(b"x");
    let failing = async { Err(Error::NotFound("x".into())) }.boxed();

    let err = cache.get_or_put("app", &sha256, 1, failing).await.unwrap_err();
    assert_eq!(err, Error::NotFound("x".into()));

    // a later attempt can still fill the entry
    cache.get_or_put("app", &sha256, 2, produce(b"x")).await.unwrap();
    assert!(cache.contains(&sha256));
}

#[tokio::test]
async fn test_prune_evicts_least_recently_used() {
    let cache = MemoryCache::new(10);
    let a = ContentHash::of(b"aaaa");
    let b = ContentHash::of(b"bbbb");
    let c = ContentHash::of(b"cccc");

    cache.get_or_put("app", &a, 1, produce(b"aaaa")).await.unwrap();
    cache.get_or_put("app", &b, 2, produce(b"bbbb")).await.unwrap();
    // touching `a` makes `b` the oldest
    cache.get_or_put("app", &a, 3, never()).await.unwrap();
    cache.get_or_put("app", &c, 4, produce(b"cccc")).await.unwrap();

    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
    assert!(cache.size() <= 10);
}

#[tokio::test]
async fn test_pinned_entries_survive_prune() {
    let cache = MemoryCache::new(4);
    let a = ContentHash::of(b"aaaa");
    let b = ContentHash::of(b"bbbb");

    let manifest = LoadedManifest::new(b"m1".to_vec(), 1).module("a", a);
    cache.pin_manifest("app", &manifest, 1).await.unwrap();

    cache.get_or_put("app", &a, 1, produce(b"aaaa")).await.unwrap();
    cache.get_or_put("app", &b, 2, produce(b"bbbb")).await.unwrap();

    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
}

#[tokio::test]
async fn test_repinning_releases_previous_manifest() {
    let cache = MemoryCache::new(1024);
    let shared = ContentHash::of(b"shared");
    let old = ContentHash::of(b"old");
    let new = ContentHash::of(b"new");

    let v1 = LoadedManifest::new(b"v1".to_vec(), 1).module("shared", shared).module("x", old);
    let v2 = LoadedManifest::new(b"v2".to_vec(), 2).module("shared", shared).module("x", new);

    cache.pin_manifest("app", &v1, 1).await.unwrap();
    cache.pin_manifest("app", &v2, 2).await.unwrap();

    assert_eq!(cache.pin_count(&shared), 1);
    assert_eq!(cache.pin_count(&old), 0);
    assert_eq!(cache.pin_count(&new), 1);
    assert_eq!(cache.get_pinned_manifest("app", 3).await, Some(v2));
}

#[tokio::test]
async fn test_pins_counted_per_application() {
    let cache = MemoryCache::new(1024);
    let shared = ContentHash::of(b"shared");
    let manifest = LoadedManifest::new(b"m".to_vec(), 1).module("shared", shared);

    cache.pin_manifest("one", &manifest, 1).await.unwrap();
    cache.pin_manifest("two", &manifest, 1).await.unwrap();
    assert_eq!(cache.pin_count(&shared), 2);

    cache.unpin_manifest("one", &manifest, 2).await.unwrap();
    assert_eq!(cache.pin_count(&shared), 1);
    assert!(cache.get_pinned_manifest("one", 2).await.is_none());
    assert!(cache.get_pinned_manifest("two", 2).await.is_some());
}

#[tokio::test]
async fn test_update_fresh_at() {
    let cache = MemoryCache::new(1024);
    let manifest = LoadedManifest::new(b"m".to_vec(), 1);

    let err = cache.update_manifest_fresh_at("app", &manifest, 5).await.unwrap_err();
    assert!(matches!(err, Error::Cache(_)));

    cache.pin_manifest("app", &manifest, 1).await.unwrap();
    cache.update_manifest_fresh_at("app", &manifest, 5).await.unwrap();
    assert_eq!(cache.get_pinned_manifest("app", 6).await.unwrap().fresh_at_epoch_ms, 5);

    let other = LoadedManifest::new(b"other".to_vec(), 1);
    assert!(cache.update_manifest_fresh_at("app", &other, 7).await.is_err());
}

#[test]
fn test_resolved_url() {
    let sha256 = ContentHash::of(b"");
    let relative = FetchRequest::new("app", "m", sha256, "mod.js").base_url("https://cdn/app/");
    let absolute = FetchRequest::new("app", "m", sha256, "https://other/mod.js").base_url("https://cdn/app");

    assert_eq!(relative.resolved_url(), "https://cdn/app/mod.js");
    assert_eq!(absolute.resolved_url(), "https://other/mod.js");
}
