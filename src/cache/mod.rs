//! Report cache.
//!
//! Generated reports are cached per `(report type, config fingerprint)` with a
//! TTL and dropped by explicit or data-driven invalidation:
//!
//! - [`ReportStore`]: storage seam, with the in-process [`MemoryReportStore`]
//! - [`ReportCache`]: lazy expiry, error degradation, single-flight generation
//! - [`InvalidationScope`]: which entries an admin action or
//!   [`InvalidationEvent`] drops, driven by [`deps::REPORT_DEPENDENCIES`]
//! - [`CacheMetrics`]: generation cost and hit rate
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 600
//! max_entries = 500
//! generation_timeout_ms = 30000
//! # ... see config.rs for all options
//! ```

mod config;
pub mod deps;
mod events;
mod inflight;
mod keys;
mod lock;
mod metrics;
mod planner;
mod service;
mod store;

pub use config::CacheConfig;
pub use events::InvalidationEvent;
pub use keys::{CacheKey, canonical_form, fingerprint};
pub use metrics::{CacheMetrics, GenerationStats, MetricsSample, MetricsSummary};
pub use planner::InvalidationScope;
pub use service::{CacheOutcome, CacheStats, ReportCache, WarmSummary};
pub use store::{CachedEntry, EntryFilter, EntryMeta, MemoryReportStore, ReportStore, StoreError};
