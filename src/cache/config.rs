//! Report cache configuration.
//!
//! Built from the `[cache]` section of `bistro.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_TTL_SECS: u64 = 600;
const DEFAULT_MAX_ENTRIES: usize = 500;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
const DEFAULT_GENERATION_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_WARM_WINDOWS_DAYS: [u32; 2] = [7, 30];

/// Runtime knobs for [`ReportCache`](super::ReportCache).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup misses and nothing is stored.
    pub enabled: bool,
    /// Lifetime of a stored report.
    pub ttl_secs: u64,
    /// LRU bound of the in-memory store.
    pub max_entries: usize,
    /// Cadence of the background expired-entry sweep.
    pub cleanup_interval_secs: u64,
    /// Deadline around a single generator call.
    pub generation_timeout_ms: u64,
    /// Share one generator call between concurrent misses for the same key.
    pub single_flight: bool,
    /// Warm the common report set when the server starts.
    pub warm_on_startup: bool,
    /// Trailing windows, in days, that make up the common report set.
    pub warm_windows_days: Vec<u32>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_TTL_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            generation_timeout_ms: DEFAULT_GENERATION_TIMEOUT_MS,
            single_flight: true,
            warm_on_startup: false,
            warm_windows_days: DEFAULT_WARM_WINDOWS_DAYS.to_vec(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_secs: settings.ttl.as_secs(),
            max_entries: settings.max_entries,
            cleanup_interval_secs: settings.cleanup_interval.as_secs(),
            generation_timeout_ms: settings.generation_timeout.as_millis() as u64,
            single_flight: settings.single_flight,
            warm_on_startup: settings.warm_on_startup,
            warm_windows_days: settings.warm_windows_days.clone(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_millis(self.generation_timeout_ms)
    }

    /// Returns the store bound as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}
