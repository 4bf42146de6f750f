//! Configuration Module
//!
//! Handles building cache configuration, either from defaults or from
//! environment variables.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

// == Defaults ==
/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default TTL applied when `set` is called with a zero TTL
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default interval between background expiry sweeps
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);

/// Cache configuration parameters.
///
/// Immutable once handed to [`Cache::with_config`](crate::Cache::with_config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum number of entries the cache can hold (0 = unbounded)
    pub max_size: usize,
    /// TTL used when `set` is given a zero TTL (zero = entries never expire)
    pub default_ttl: Duration,
    /// Interval between background expiry sweeps (zero = no background sweep)
    pub reap_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset variables fall back to the defaults. A variable that is set but
    /// does not parse as an unsigned integer is reported as
    /// [`CacheError::InvalidConfig`].
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL_SECS` - Default TTL in seconds (default: 86400)
    /// - `CACHE_REAP_INTERVAL_SECS` - Expiry sweep interval in seconds (default: 60)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let max_size = parse_var(&lookup, "CACHE_MAX_SIZE")?
            .map(|v| v as usize)
            .unwrap_or(defaults.max_size);
        let default_ttl = parse_var(&lookup, "CACHE_DEFAULT_TTL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_ttl);
        let reap_interval = parse_var(&lookup, "CACHE_REAP_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.reap_interval);

        Ok(Self {
            max_size,
            default_ttl,
            reap_interval,
        })
    }
}

fn parse_var<F>(lookup: &F, name: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<u64>().map(Some).map_err(|_| {
            CacheError::InvalidConfig(format!(
                "{} must be a non-negative integer, got {:?}",
                name, raw
            ))
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl: DEFAULT_TTL,
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}
