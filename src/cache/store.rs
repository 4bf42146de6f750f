//! Cache Store Module
//!
//! Main cache engine combining a concurrent value store with LRU tracking and
//! TTL expiration.
//!
//! # Locking
//! Recency order and the key locator sit behind one mutex (the structural
//! lock). Values live in a sharded `DashMap` that readers and writers reach
//! without that mutex. Locks are always taken structural lock first, value
//! shard second, and no value shard guard is ever held while waiting for the
//! structural lock.
//!
//! A key is in the cache only if the structural lock knows about it. A value
//! read without a matching recency node is treated as a miss.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::entry::expiration_for;
use crate::cache::{CacheEntry, LruTracker};
use crate::config::Config;
use crate::tasks::{Reap, ReapReport, Reaper};

struct Inner<V> {
    lru: Mutex<LruTracker>,
    values: DashMap<String, CacheEntry<V>>,
    config: Config,
    reaper: Option<Reaper>,
}

// == Cache ==
/// Thread-safe in-memory cache with LRU eviction and TTL expiration.
///
/// Share it between threads or tasks with `Arc<Cache<V>>`. Dropping the cache
/// also shuts its background reaper down.
pub struct Cache<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with the default configuration (1000 entries, 24h TTL)
    /// and starts its expiry reaper.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a cache with an explicit configuration.
    ///
    /// The expiry reaper is started unless `config.reap_interval` is zero.
    pub fn with_config(config: Config) -> Self {
        let inner = Arc::new_cyclic(|weak| {
            let reaper = if config.reap_interval.is_zero() {
                debug!("Reap interval is zero, background expiry disabled");
                None
            } else {
                Some(Reaper::spawn(weak.clone(), config.reap_interval))
            };

            Inner {
                lru: Mutex::new(LruTracker::new()),
                values: DashMap::new(),
                config,
                reaper,
            }
        });

        debug!(
            "Cache created: max_size={}, default_ttl={:?}",
            config.max_size, config.default_ttl
        );

        Self { inner }
    }

    // == Set ==
    /// Stores a value, replacing any previous value and expiration for `key`.
    ///
    /// A non-zero `ttl` expires the entry `ttl` from now. A zero `ttl` uses the
    /// configured default TTL, or no expiration if that is zero too. When the
    /// cache is bounded and full, exactly one least recently used entry is
    /// evicted.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = expiration_for(Instant::now(), ttl, self.inner.config.default_ttl);
        let max_size = self.inner.config.max_size;

        let evicted = {
            let mut lru = self.inner.lru.lock();
            lru.touch(&key);

            if max_size > 0 && lru.len() > max_size {
                lru.evict_oldest()
                    .map(|oldest| {
                        let entry = self.inner.values.remove(&oldest);
                        (oldest, entry)
                    })
            } else {
                None
            }
        };

        if let Some((evicted_key, _)) = evicted {
            debug!(key = %evicted_key, "Evicted least recently used entry");
        }

        self.inner
            .values
            .insert(key, CacheEntry::new(value, expires_at));
    }

    // == Get ==
    /// Retrieves a value by key and marks it most recently used.
    ///
    /// Returns None if the key is absent, expired or was evicted concurrently.
    /// An expired entry found here is removed on the spot.
    pub fn get(&self, key: &str) -> Option<V> {
        let entry = self.inner.values.get(key).map(|e| e.value().clone())?;

        let now = Instant::now();
        if entry.is_expired_at(now) {
            self.inner.remove_expired(key, now);
            return None;
        }

        if !self.inner.lru.lock().promote(key) {
            return None;
        }

        Some(entry.value)
    }

    // == Contains Key ==
    /// Checks whether `key` is live without touching its recency.
    pub fn contains_key(&self, key: &str) -> bool {
        let live = self
            .inner
            .values
            .get(key)
            .map(|e| !e.value().is_expired())
            .unwrap_or(false);

        live && self.inner.lru.lock().contains(key)
    }

    // == Delete ==
    /// Removes an entry by key. Absent keys are ignored.
    pub fn delete(&self, key: &str) {
        let _removed = {
            let mut lru = self.inner.lru.lock();
            lru.remove(key);
            // Under the lock, so a concurrent set cannot keep a node whose
            // value this call then deletes
            self.inner.values.remove(key)
        };
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        let previous = {
            let mut lru = self.inner.lru.lock();
            let previous = std::mem::take(&mut *lru);
            self.inner.values.clear();
            previous
        };

        debug!("Cache cleared, dropped {} entries", previous.len());
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.inner.lru.lock().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configuration this cache was built with.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // == Stop ==
    /// Stops the background expiry reaper. Safe to call more than once.
    ///
    /// The cache stays fully usable afterwards; expired entries are then only
    /// removed when they are read.
    pub fn stop(&self) {
        if let Some(reaper) = &self.inner.reaper {
            reaper.stop();
        }
    }

    /// Returns true while the background expiry reaper is running.
    pub fn is_reaper_running(&self) -> bool {
        self.inner
            .reaper
            .as_ref()
            .map(|reaper| !reaper.is_finished())
            .unwrap_or(false)
    }

    /// Runs one expiry sweep immediately, on the calling thread.
    pub fn reap_now(&self) -> ReapReport {
        self.inner.reap()
    }
}

impl<V> Default for Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Cache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("len", &self.inner.lru.lock().len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl<V> Inner<V> {
    /// Removes `key` only if its stored entry is still expired at `now`.
    ///
    /// The expiration is re-read under the structural lock, so an entry that a
    /// finished `set` has refreshed is left alone.
    fn remove_expired(&self, key: &str, now: Instant) -> bool {
        let removed = {
            let mut lru = self.lru.lock();
            let removed = self
                .values
                .remove_if(key, |_, entry| entry.is_expired_at(now));
            if removed.is_some() {
                lru.remove(key);
            }
            removed
        };
        removed.is_some()
    }

    /// Removes a stored value that has no recency node.
    fn remove_orphan(&self, key: &str) -> bool {
        let removed = {
            let lru = self.lru.lock();
            if lru.contains(key) {
                None
            } else {
                self.values.remove(key)
            }
        };
        removed.is_some()
    }
}

impl<V> Reap for Inner<V>
where
    V: Send + Sync + 'static,
{
    fn reap(&self) -> ReapReport {
        let now = Instant::now();

        // Snapshot first: removing while iterating would deadlock on the shard.
        let snapshot: Vec<(String, bool)> = self
            .values
            .iter()
            .map(|e| (e.key().clone(), e.value().is_expired_at(now)))
            .collect();

        let mut report = ReapReport::default();
        for (key, expired) in snapshot {
            if expired {
                if self.remove_expired(&key, now) {
                    report.expired += 1;
                }
            } else if self.remove_orphan(&key) {
                report.orphaned += 1;
            }
        }
        report
    }
}
