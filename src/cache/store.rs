//! Report storage backends.
//!
//! [`ReportStore`] is the seam for plugging in an external cache service.
//! [`MemoryReportStore`] is the single-instance backend: an LRU map behind a
//! lock, so a reader never observes a partially written entry.

use std::num::NonZeroUsize;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::reports::{Report, ReportConfig};
use crate::domain::types::ReportType;

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

/// A generated report together with the config that produced it.
///
/// The config is kept because the key is a one-way fingerprint and date-scoped
/// invalidation needs the windows.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub key: CacheKey,
    pub config: ReportConfig,
    pub report: Report,
    pub generated_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl CachedEntry {
    pub fn new(
        key: CacheKey,
        config: ReportConfig,
        report: Report,
        generated_at: OffsetDateTime,
        ttl: Duration,
    ) -> Self {
        let ttl = time::Duration::try_from(ttl).unwrap_or(time::Duration::MAX);
        let expires_at = generated_at
            .checked_add(ttl)
            .unwrap_or(generated_at + time::Duration::days(365 * 100));
        Self {
            key,
            config,
            report,
            generated_at,
            expires_at,
        }
    }

    pub fn report_type(&self) -> ReportType {
        self.key.report_type()
    }

    pub fn is_fresh_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            key: self.key.clone(),
            generated_at: self.generated_at,
            expires_at: self.expires_at,
        }
    }
}

/// Lightweight view of an entry used for statistics.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub key: CacheKey,
    pub generated_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache backend operation `{op}` failed: {message}")]
    Operation { op: &'static str, message: String },
}

impl StoreError {
    pub fn operation(op: &'static str, message: impl Into<String>) -> Self {
        Self::Operation {
            op,
            message: message.into(),
        }
    }
}

/// Predicate used by bulk removal.
pub type EntryFilter<'a> = &'a (dyn Fn(&CachedEntry) -> bool + Send + Sync);

/// Key-value storage for cached reports. Implementations must make every
/// single-key operation atomic.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, StoreError>;

    /// Store or overwrite an entry. Returns the key evicted to make room, if any.
    async fn put(&self, entry: CachedEntry) -> Result<Option<CacheKey>, StoreError>;

    /// Remove `key` only if its entry is expired at `now`.
    async fn remove_stale(&self, key: &CacheKey, now: OffsetDateTime)
    -> Result<bool, StoreError>;

    /// Remove every entry matching `predicate`, returning how many were dropped.
    async fn remove_matching(&self, predicate: EntryFilter<'_>) -> Result<usize, StoreError>;

    /// Drop everything, returning how many entries were held.
    async fn clear(&self) -> Result<usize, StoreError>;

    async fn entries(&self) -> Result<Vec<EntryMeta>, StoreError>;
}

/// In-process LRU-bounded report store.
pub struct MemoryReportStore {
    entries: RwLock<LruCache<CacheKey, CachedEntry>>,
}

impl MemoryReportStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.max_entries_non_zero())
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Get the number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, StoreError> {
        Ok(rw_write(&self.entries, SOURCE, "get").get(key).cloned())
    }

    async fn put(&self, entry: CachedEntry) -> Result<Option<CacheKey>, StoreError> {
        let key = entry.key.clone();
        let displaced = rw_write(&self.entries, SOURCE, "put").push(key.clone(), entry);

        // `push` also hands back the previous value stored under the same key.
        let evicted = displaced
            .map(|(displaced_key, _)| displaced_key)
            .filter(|displaced_key| *displaced_key != key);
        if evicted.is_some() {
            counter!("bistro_report_cache_evict_total").increment(1);
        }
        Ok(evicted)
    }

    async fn remove_stale(
        &self,
        key: &CacheKey,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_stale");
        let stale = entries
            .peek(key)
            .is_some_and(|entry| !entry.is_fresh_at(now));
        if stale {
            entries.pop(key);
        }
        Ok(stale)
    }

    async fn remove_matching(&self, predicate: EntryFilter<'_>) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_matching");
        let doomed: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| predicate(entry))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "clear");
        let count = entries.len();
        entries.clear();
        Ok(count)
    }

    async fn entries(&self) -> Result<Vec<EntryMeta>, StoreError> {
        Ok(rw_read(&self.entries, SOURCE, "entries")
            .iter()
            .map(|(_, entry)| entry.meta())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use time::macros::datetime;

    use super::*;
    use crate::domain::reports::DateRange;

    fn config(day: u8) -> ReportConfig {
        let from = datetime!(2024-01-01 0:00 UTC) + time::Duration::days(i64::from(day));
        ReportConfig::new(
            DateRange::new(from, from + time::Duration::days(1)).expect("valid range"),
        )
    }

    fn entry(report_type: ReportType, day: u8, ttl: Duration) -> CachedEntry {
        let config = config(day);
        CachedEntry::new(
            CacheKey::new(report_type, &config),
            config,
            Report::new(serde_json::json!({ "day": day })),
            OffsetDateTime::now_utc(),
            ttl,
        )
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let store = MemoryReportStore::new(&CacheConfig::default());
        let cached = entry(ReportType::SalesSummary, 1, Duration::from_secs(60));
        let key = cached.key.clone();

        assert!(store.get(&key).await.expect("get").is_none());
        assert!(store.put(cached.clone()).await.expect("put").is_none());

        let found = store.get(&key).await.expect("get").expect("stored entry");
        assert!(found.report.shares_payload(&cached.report));
    }

    #[tokio::test]
    async fn overwrite_is_not_reported_as_eviction() {
        let store = MemoryReportStore::new(&CacheConfig::default());
        let first = entry(ReportType::SalesSummary, 1, Duration::from_secs(60));
        let second = entry(ReportType::SalesSummary, 1, Duration::from_secs(120));

        store.put(first).await.expect("put");
        let evicted = store.put(second.clone()).await.expect("put");

        assert!(evicted.is_none());
        assert_eq!(store.len(), 1);
        let found = store.get(&second.key).await.expect("get").expect("entry");
        assert_eq!(found.expires_at, second.expires_at);
    }

    #[tokio::test]
    async fn lru_bound_evicts_least_recent() {
        let store = MemoryReportStore::with_capacity(NonZeroUsize::new(2).expect("non-zero"));
        let a = entry(ReportType::SalesSummary, 1, Duration::from_secs(60));
        let b = entry(ReportType::SalesSummary, 2, Duration::from_secs(60));
        let c = entry(ReportType::SalesSummary, 3, Duration::from_secs(60));

        store.put(a.clone()).await.expect("put");
        store.put(b.clone()).await.expect("put");
        // Touch `a` so `b` becomes least recently used.
        store.get(&a.key).await.expect("get");

        let evicted = store.put(c.clone()).await.expect("put");
        assert_eq!(evicted, Some(b.key.clone()));
        assert!(store.get(&b.key).await.expect("get").is_none());
        assert!(store.get(&a.key).await.expect("get").is_some());
    }

    #[tokio::test]
    async fn remove_stale_leaves_fresh_entries() {
        let store = MemoryReportStore::new(&CacheConfig::default());
        let fresh = entry(ReportType::SalesSummary, 1, Duration::from_secs(60));
        let stale = entry(ReportType::SalesSummary, 2, Duration::ZERO);
        store.put(fresh.clone()).await.expect("put");
        store.put(stale.clone()).await.expect("put");

        let now = OffsetDateTime::now_utc();
        assert!(!store.remove_stale(&fresh.key, now).await.expect("remove"));
        assert!(store.remove_stale(&stale.key, now).await.expect("remove"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_matching_counts_removed_entries() {
        let store = MemoryReportStore::new(&CacheConfig::default());
        store
            .put(entry(ReportType::SalesSummary, 1, Duration::from_secs(60)))
            .await
            .expect("put");
        store
            .put(entry(ReportType::SalesSummary, 2, Duration::from_secs(60)))
            .await
            .expect("put");
        store
            .put(entry(ReportType::LaborAnalysis, 1, Duration::from_secs(60)))
            .await
            .expect("put");

        let removed = store
            .remove_matching(&|e: &CachedEntry| e.report_type() == ReportType::SalesSummary)
            .await
            .expect("remove");
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.clear().await.expect("clear"), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn zero_ttl_entry_is_born_expired() {
        let cached = entry(ReportType::SalesSummary, 1, Duration::ZERO);
        assert!(!cached.is_fresh_at(cached.generated_at));
    }

    #[tokio::test]
    async fn store_recovers_from_poisoned_lock() {
        let store = MemoryReportStore::new(&CacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store
            .put(entry(ReportType::SalesSummary, 1, Duration::from_secs(60)))
            .await
            .expect("put");
        assert_eq!(store.len(), 1);
    }
}
