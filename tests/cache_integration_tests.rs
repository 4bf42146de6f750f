//! Integration Tests for the Cache
//!
//! Exercises the public API end to end: eviction, expiry, the background
//! reaper and concurrent use from many threads and tasks.

use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use lru_ttl_cache::{Cache, Config};
use rand::Rng;

// == Helper Functions ==

static INIT_TRACING: Once = Once::new();

fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "lru_ttl_cache=debug".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

fn bounded(max_size: usize) -> Cache<String> {
    init_tracing();
    Cache::with_config(Config {
        max_size,
        default_ttl: Duration::from_secs(3600),
        reap_interval: Duration::ZERO,
    })
}

// == Eviction ==

#[test]
fn test_first_key_evicted_when_over_capacity() {
    let cache = bounded(3);

    for key in ["a", "b", "c", "d"] {
        cache.set(key, key.to_uppercase(), Duration::ZERO);
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.get("b").as_deref(), Some("B"));
    assert_eq!(cache.get("c").as_deref(), Some("C"));
    assert_eq!(cache.get("d").as_deref(), Some("D"));
}

#[test]
fn test_get_promotes_key() {
    let cache = bounded(2);

    cache.set("A", "a".to_string(), Duration::ZERO);
    cache.set("B", "b".to_string(), Duration::ZERO);
    assert!(cache.get("A").is_some());
    cache.set("C", "c".to_string(), Duration::ZERO);

    assert!(cache.get("A").is_some());
    assert!(cache.get("B").is_none());
    assert!(cache.get("C").is_some());
}

// == Expiry ==

#[test]
fn test_explicit_ttl_expires() {
    let cache = bounded(10);

    cache.set("key", "v".to_string(), Duration::from_millis(50));
    assert_eq!(cache.get("key").as_deref(), Some("v"));

    thread::sleep(Duration::from_millis(60));
    assert_eq!(cache.get("key"), None);
}

#[test]
fn test_no_default_ttl_means_no_expiry() {
    init_tracing();
    let cache: Cache<u64> = Cache::with_config(Config {
        max_size: 10,
        default_ttl: Duration::ZERO,
        reap_interval: Duration::from_millis(10),
    });

    cache.set("key", 7, Duration::ZERO);
    thread::sleep(Duration::from_millis(100));

    assert_eq!(cache.get("key"), Some(7));
    cache.stop();
}

#[test]
fn test_clear_then_reuse() {
    let cache = bounded(10);

    cache.set("x", "1".to_string(), Duration::ZERO);
    cache.set("y", "2".to_string(), Duration::ZERO);
    cache.clear();

    assert_eq!(cache.len(), 0);
    assert!(cache.get("x").is_none());

    cache.set("x", "3".to_string(), Duration::ZERO);
    assert_eq!(cache.get("x").as_deref(), Some("3"));
}

// == Background Reaper ==

#[tokio::test]
async fn test_reaper_removes_expired_entries_without_reads() {
    init_tracing();
    let cache: Cache<String> = Cache::with_config(Config {
        max_size: 100,
        default_ttl: Duration::ZERO,
        reap_interval: Duration::from_millis(50),
    });

    cache.set("expire_soon", "v".to_string(), Duration::from_millis(20));
    cache.set("long_lived", "v".to_string(), Duration::from_secs(3600));
    assert_eq!(cache.len(), 2);

    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(cache.len(), 1, "Reaper should have removed the expired entry");
    assert!(cache.contains_key("long_lived"));
    cache.stop();
}

#[tokio::test]
async fn test_stop_halts_reaper() {
    init_tracing();
    let cache: Cache<String> = Cache::with_config(Config {
        max_size: 100,
        default_ttl: Duration::ZERO,
        reap_interval: Duration::from_millis(20),
    });
    assert!(cache.is_reaper_running());

    cache.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!cache.is_reaper_running());

    // No sweep runs any more; the expired entry stays tracked until read
    cache.set("expired", "v".to_string(), Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("expired"), None);
    assert_eq!(cache.len(), 0);
}

// == Concurrency ==

#[test]
fn test_concurrent_random_operations_respect_bound() {
    const MAX_SIZE: usize = 16;
    const THREADS: usize = 8;
    const OPS_PER_THREAD: usize = 5_000;

    let cache = Arc::new(bounded(MAX_SIZE));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                for _ in 0..OPS_PER_THREAD {
                    let key = format!("key{}", rng.gen_range(0..64));
                    match rng.gen_range(0..100) {
                        0..=44 => {
                            let ttl = Duration::from_millis(rng.gen_range(0..5));
                            cache.set(key.clone(), key, ttl);
                        }
                        45..=84 => {
                            if let Some(value) = cache.get(&key) {
                                assert_eq!(value, key, "Value must match the key it was stored under");
                            }
                        }
                        85..=98 => cache.delete(&key),
                        _ => cache.clear(),
                    }
                    assert!(cache.len() <= MAX_SIZE);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    assert!(cache.len() <= MAX_SIZE);
    cache.reap_now();
    assert!(cache.len() <= MAX_SIZE);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_tasks_with_running_reaper() {
    init_tracing();
    let cache: Arc<Cache<usize>> = Arc::new(Cache::with_config(Config {
        max_size: 32,
        default_ttl: Duration::from_millis(5),
        reap_interval: Duration::from_millis(5),
    }));

    let mut handles = Vec::new();
    for worker in 0..16usize {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            for i in 0..500usize {
                let key = format!("k{}", (worker * 7 + i) % 48);
                if i % 3 == 0 {
                    cache.delete(&key);
                } else {
                    cache.set(key.clone(), i, Duration::ZERO);
                    let _ = cache.get(&key);
                }
                assert!(cache.len() <= 32);
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(cache.len(), 0, "Every entry should have expired and been reaped");
    cache.stop();
}
