use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};

fn counting_compute(
    calls: &Arc<AtomicU32>,
    value: i32,
) -> impl Future<Output = Result<i32, String>> {
    let calls = Arc::clone(calls);
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(value)
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_or_compute_within_ttl_computes_once() {
    let cache = TtlCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let ttl = Duration::from_secs(60);

    let first = cache
        .get_or_compute("k", ttl, || counting_compute(&calls, 1))
        .await;
    let second = cache
        .get_or_compute("k", ttl, || counting_compute(&calls, 2))
        .await;

    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_get_or_compute_after_ttl_recomputes() {
    let cache = TtlCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let ttl = Duration::from_secs(60);

    let _ = cache
        .get_or_compute("k", ttl, || counting_compute(&calls, 1))
        .await;
    tokio::time::advance(Duration::from_secs(60)).await;

    let refreshed = cache
        .get_or_compute("k", ttl, || counting_compute(&calls, 2))
        .await;
    assert_eq!(refreshed, Ok(2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let cache: TtlCache<i32> = TtlCache::new();
    let ttl = Duration::from_secs(60);

    let failed = cache
        .get_or_compute("k", ttl, || async { Err::<i32, _>("upstream down") })
        .await;
    assert_eq!(failed, Err("upstream down"));
    assert!(cache.get("k").is_none());

    let ok = cache
        .get_or_compute("k", ttl, || async { Ok::<_, &str>(7) })
        .await;
    assert_eq!(ok, Ok(7));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_misses_share_one_compute() {
    let cache = Arc::new(TtlCache::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        let calls = Arc::clone(&calls);
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute("k", Duration::from_secs(60), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, String>("value".to_string())
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok("value".to_string()));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.in_flight.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_absent_before_eviction() {
    let cache = TtlCache::new();
    cache.insert("a", 1, Duration::from_secs(10));
    cache.insert("b", 2, Duration::from_secs(30));

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("b"), Some(2));
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_and_invalidate() {
    let cache = TtlCache::new();
    cache.insert("a", 1, Duration::from_secs(5));
    cache.insert("b", 2, Duration::from_secs(5));
    cache.insert("c", 3, Duration::from_secs(60));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(cache.sweep_expired(), 2);
    assert_eq!(cache.len(), 1);

    assert!(cache.invalidate("c"));
    assert!(!cache.invalidate("c"));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_evicts_in_background() {
    let cache = Arc::new(TtlCache::new());
    cache.insert("a", 1, Duration::from_secs(1));
    let handle = cache.spawn_sweeper(Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(cache.is_empty());

    drop(cache);
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(handle.is_finished());
}

#[test]
fn test_build_key_is_order_independent() {
    let a = json!(1);
    let b = json!(2);

    let k1 = build_key("trials", [("a", &a), ("b", &b)]);
    let k2 = build_key("trials", [("b", &b), ("a", &a)]);
    assert_eq!(k1, k2);
    assert!(k1.starts_with("trials:"));
    assert_eq!(k1.len(), "trials:".len() + 64);
}

#[test]
fn test_build_key_distinguishes_values_and_namespaces() {
    let one = json!(1);
    let text = json!("1");

    assert_ne!(build_key("ns", [("a", &one)]), build_key("ns", [("a", &text)]));
    assert_ne!(build_key("ns", [("a", &one)]), build_key("other", [("a", &one)]));
    assert_ne!(build_key("ns", [("a", &one)]), build_key("ns", [("b", &one)]));
}

#[test]
fn test_build_key_from_json_object() {
    let params = json!({"query": "aspirin", "page": 2});
    let reordered = json!({"page": 2, "query": "aspirin"});

    let k1 = build_key("search", params.as_object().unwrap().iter());
    let k2 = build_key("search", reordered.as_object().unwrap().iter());
    assert_eq!(k1, k2);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_ttl_never_expires() {
    let cache = TtlCache::new();
    let calls = Arc::new(AtomicU32::new(0));

    let first = cache
        .get_or_compute("forever", Duration::MAX, || counting_compute(&calls, 1))
        .await;
    tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
    let second = cache
        .get_or_compute("forever", Duration::MAX, || counting_compute(&calls, 2))
        .await;

    assert_eq!(first, Ok(1));
    assert_eq!(second, Ok(1));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.sweep_expired(), 0);
    assert_eq!(cache.get("forever"), Some(1));
}
