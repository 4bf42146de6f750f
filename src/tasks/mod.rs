//! Background Tasks Module
//!
//! Contains background tasks that run periodically for the lifetime of a cache.
//!
//! # Tasks
//! - Expiry Reaper: Removes expired cache entries at a configured interval

mod reaper;

pub use reaper::{Reap, ReapReport, Reaper};
