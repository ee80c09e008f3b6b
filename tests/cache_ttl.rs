//! TTL behaviour of the cache manager over both backends

use careeros_resilience::cache::{
    CacheBackend, CacheConfig, CacheKey, CacheKeyBuilder, CacheManager, DocumentCache,
    InMemoryDocumentStore, MemoryCache,
};
use careeros_resilience::clock::{Clock, ManualClock};
use std::sync::Arc;
use std::time::Duration;

fn backends(clock: &Arc<ManualClock>) -> Vec<Arc<dyn CacheBackend>> {
    vec![
        Arc::new(MemoryCache::with_clock(100, clock.clone())),
        Arc::new(DocumentCache::with_clock(
            Arc::new(InMemoryDocumentStore::new()),
            "ttl_test",
            clock.clone(),
        )),
    ]
}

#[tokio::test]
async fn test_hit_before_ttl_and_miss_after() {
    let clock = Arc::new(ManualClock::new(1_000_000));
    for backend in backends(&clock) {
        clock.set(1_000_000);
        let cache = CacheManager::new(
            CacheConfig::new().with_ttl(Duration::from_millis(1000)),
            backend,
        );
        let key = CacheKey::new("a");
        cache.set(&key, &1u32).await.unwrap();

        clock.advance(Duration::from_millis(500));
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), Some(1), "{}", cache.backend_name());

        clock.advance(Duration::from_millis(1000));
        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None, "{}", cache.backend_name());
    }
}

#[tokio::test]
async fn test_entry_exactly_at_ttl_is_expired() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = CacheManager::new(
        CacheConfig::new().with_ttl(Duration::from_millis(1000)),
        Arc::new(MemoryCache::with_clock(10, clock.clone())),
    );
    let key = CacheKey::new("edge");
    cache.set(&key, &"v").await.unwrap();
    clock.advance(Duration::from_millis(999));
    assert!(cache.get::<String>(&key).await.unwrap().is_some());
    clock.advance(Duration::from_millis(1));
    assert!(cache.get::<String>(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_removes_every_expired_entry() {
    let clock = Arc::new(ManualClock::new(0));
    for backend in backends(&clock) {
        clock.set(0);
        let cache = CacheManager::new(CacheConfig::new(), backend);
        for i in 0..5 {
            let key = CacheKey::new(format!("short-{i}"));
            cache
                .set_with_ttl(&key, &i, Duration::from_millis(100))
                .await
                .unwrap();
        }
        cache
            .set_with_ttl(&CacheKey::new("long"), &"keep", Duration::from_secs(60))
            .await
            .unwrap();

        clock.advance(Duration::from_millis(200));
        assert_eq!(cache.sweep_expired().await.unwrap(), 5);
        assert_eq!(cache.len().await.unwrap(), 1);
        assert_eq!(cache.sweep_expired().await.unwrap(), 0);
        assert_eq!(cache.stats().swept, 5);
    }
}

#[tokio::test]
async fn test_refresh_replaces_value_and_timestamp() {
    let clock = Arc::new(ManualClock::new(10_000));
    for backend in backends(&clock) {
        clock.set(10_000);
        let cache = CacheManager::new(CacheConfig::new(), backend);
        let key = CacheKey::new("k");
        cache.set(&key, &"v1").await.unwrap();

        clock.advance(Duration::from_millis(250));
        cache.set(&key, &"v2").await.unwrap();

        assert_eq!(cache.get::<String>(&key).await.unwrap().as_deref(), Some("v2"));
        let entry = cache.entry(&key).await.unwrap().expect("entry present");
        assert_eq!(entry.stored_at_ms, 10_250);
    }
}

#[tokio::test]
async fn test_reordered_inputs_share_an_entry() {
    let cache = CacheManager::new(CacheConfig::new(), Arc::new(MemoryCache::new(10)));
    let first = CacheKeyBuilder::new()
        .namespace("transferable")
        .scalar("Analyst")
        .items(["SQL", "Python", "Excel"])
        .build();
    let second = CacheKeyBuilder::new()
        .namespace("transferable")
        .scalar("Analyst")
        .items(["excel", " python", "sql"])
        .build();

    cache.set(&first, &vec!["statistics"]).await.unwrap();
    assert_eq!(
        cache.get::<Vec<String>>(&second).await.unwrap(),
        Some(vec!["statistics".to_string()])
    );
}

#[tokio::test]
async fn test_len_counts_only_unexpired_entries_without_sweep() {
    let clock = Arc::new(ManualClock::new(0));
    for backend in backends(&clock) {
        clock.set(0);
        backend
            .set(&CacheKey::new("short"), b"1", Duration::from_millis(100))
            .await
            .unwrap();
        backend
            .set(&CacheKey::new("long"), b"2", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.len().await.unwrap(), 2, "{}", backend.name());

        clock.advance(Duration::from_millis(100));
        assert_eq!(backend.len().await.unwrap(), 1, "{}", backend.name());

        clock.advance(Duration::from_secs(60));
        assert_eq!(backend.len().await.unwrap(), 0, "{}", backend.name());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access_never_returns_expired_entries() {
    const KEYS: usize = 16;
    const TTL: Duration = Duration::from_millis(5);

    let clock = Arc::new(ManualClock::new(0));
    for backend in backends(&clock) {
        clock.set(0);
        let mut tasks = Vec::new();

        let ticker = clock.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..500 {
                ticker.advance(Duration::from_millis(1));
                tokio::task::yield_now().await;
            }
        }));

        for worker in 0..8 {
            let backend = backend.clone();
            let clock = clock.clone();
            tasks.push(tokio::spawn(async move {
                for round in 0..200 {
                    let key = CacheKey::new(format!("k{}", (worker + round) % KEYS));
                    match round % 3 {
                        0 => backend.set(&key, b"1", TTL).await.unwrap(),
                        1 => {
                            let before = clock.now_ms();
                            if let Some(entry) = backend.entry(&key).await.unwrap() {
                                assert!(
                                    entry.expires_at_ms() > before,
                                    "expired entry returned: {entry:?} at {before}"
                                );
                            }
                        }
                        _ => {
                            backend.sweep_expired().await.unwrap();
                        }
                    }
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        let mut live = 0;
        for i in 0..KEYS {
            if backend.entry(&CacheKey::new(format!("k{i}"))).await.unwrap().is_some() {
                live += 1;
            }
        }
        assert_eq!(backend.len().await.unwrap(), live, "{}", backend.name());

        clock.advance(TTL);
        assert_eq!(backend.len().await.unwrap(), 0, "{}", backend.name());
        backend.sweep_expired().await.unwrap();
        assert_eq!(backend.len().await.unwrap(), 0, "{}", backend.name());
    }
}
