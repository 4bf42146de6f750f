//! LRU TTL Cache - An embedded, thread-safe in-memory cache
//!
//! Bounds memory by entry count with least-recently-used eviction and expires
//! entries by per-entry or default TTL, with a background reaper sweeping
//! expired entries.
//!
//! ```no_run
//! use std::time::Duration;
//! use lru_ttl_cache::{Cache, Config};
//!
//! let cache: Cache<String> = Cache::with_config(Config {
//!     max_size: 2,
//!     ..Config::default()
//! });
//!
//! cache.set("a", "1".to_string(), Duration::ZERO);
//! cache.set("b", "2".to_string(), Duration::from_secs(5));
//! assert_eq!(cache.get("a").as_deref(), Some("1"));
//!
//! cache.stop();
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::Cache;
pub use config::Config;
pub use error::{CacheError, Result};
