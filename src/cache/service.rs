//! The report cache facade.
//!
//! [`ReportCache`] owns lazy expiry, store-error degradation, single-flight
//! generation, and invalidation on top of any [`ReportStore`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use metrics::{counter, gauge};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::application::reports::{GenerationError, ReportGenerator, ReportGenerators};
use crate::domain::reports::{DateRange, Report, ReportConfig};
use crate::domain::types::ReportType;
use crate::util::timezone::today_utc;

use super::config::CacheConfig;
use super::events::InvalidationEvent;
use super::inflight::{GenerationFuture, InFlight, Role};
use super::keys::CacheKey;
use super::metrics::CacheMetrics;
use super::planner::InvalidationScope;
use super::store::{CachedEntry, ReportStore, StoreError};

const TARGET: &str = "bistro::cache";

/// How a report was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from a fresh cache entry.
    Hit,
    /// This caller ran the generator.
    Generated,
    /// Another caller's in-flight generation was awaited.
    Joined,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmSummary {
    pub warmed: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub entries_by_type: BTreeMap<ReportType, usize>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub oldest_entry: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub newest_entry: Option<OffsetDateTime>,
    pub expired_entries: usize,
    pub inflight_generations: usize,
}

pub struct ReportCache {
    config: CacheConfig,
    store: Arc<dyn ReportStore>,
    generators: Arc<ReportGenerators>,
    metrics: Arc<CacheMetrics>,
    inflight: InFlight,
    /// Bumped by every invalidation. A generation writes its report back only
    /// if the epoch it started under is still current.
    epoch: Arc<RwLock<u64>>,
}

impl ReportCache {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn ReportStore>,
        generators: Arc<ReportGenerators>,
        metrics: Arc<CacheMetrics>,
    ) -> Self {
        Self {
            config,
            store,
            generators,
            metrics,
            inflight: InFlight::new(),
            epoch: Arc::new(RwLock::new(0)),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<CacheMetrics> {
        &self.metrics
    }

    /// Return the cached report if it is still fresh.
    ///
    /// Expired entries are removed on the way out. Store failures read as a
    /// miss.
    pub async fn get(&self, report_type: ReportType, config: &ReportConfig) -> Option<Report> {
        if !self.config.enabled {
            self.metrics.record_miss(report_type);
            return None;
        }
        let key = CacheKey::new(report_type, config);
        let found = self.fetch_fresh(&key).await;
        if found.is_some() {
            debug!(target = TARGET, key = %key, "report cache hit");
            self.metrics.record_hit(report_type);
        } else {
            debug!(target = TARGET, key = %key, "report cache miss");
            self.metrics.record_miss(report_type);
        }
        found
    }

    /// Store a report under the configured TTL.
    pub async fn set(&self, report_type: ReportType, config: ReportConfig, report: Report) {
        self.set_with_ttl(report_type, config, report, self.config.ttl())
            .await;
    }

    /// Store a report. Failures are logged and swallowed.
    pub async fn set_with_ttl(
        &self,
        report_type: ReportType,
        config: ReportConfig,
        report: Report,
        ttl: Duration,
    ) {
        if !self.config.enabled {
            return;
        }
        let key = CacheKey::new(report_type, &config);
        let entry = CachedEntry::new(key, config, report, OffsetDateTime::now_utc(), ttl);
        store_entry(self.store.as_ref(), entry).await;
    }

    /// Serve from cache, or generate, store, and return the report.
    pub async fn get_or_generate(
        &self,
        report_type: ReportType,
        config: &ReportConfig,
    ) -> Result<(Report, CacheOutcome), GenerationError> {
        if let Some(report) = self.get(report_type, config).await {
            return Ok((report, CacheOutcome::Hit));
        }
        let key = CacheKey::new(report_type, config);
        self.generate(key, config).await
    }

    pub async fn invalidate_report_cache(
        &self,
        report_type: ReportType,
    ) -> Result<usize, StoreError> {
        self.invalidate(&InvalidationScope::ReportType(report_type))
            .await
    }

    pub async fn invalidate_date_cache(&self, date: OffsetDateTime) -> Result<usize, StoreError> {
        self.invalidate(&InvalidationScope::Date(date)).await
    }

    pub async fn invalidate_all_cache(&self) -> Result<usize, StoreError> {
        self.invalidate(&InvalidationScope::All).await
    }

    /// Drop the entries whose report types depend on the changed data.
    pub async fn smart_invalidation(
        &self,
        event: &InvalidationEvent,
    ) -> Result<usize, StoreError> {
        info!(
            target = TARGET,
            data_type = %event.data_type,
            timestamp = %event.timestamp,
            scoped = event.affected_range.is_some(),
            "smart invalidation requested"
        );
        self.invalidate(&InvalidationScope::for_event(event)).await
    }

    /// Drop the entries in `scope`.
    ///
    /// Generations still running for keys in scope are detached and will not
    /// write their report back, so no later request is served the data this
    /// invalidation replaced.
    pub async fn invalidate(&self, scope: &InvalidationScope) -> Result<usize, StoreError> {
        *self.epoch.write().await += 1;
        let detached = self
            .inflight
            .forget(|key, config| scope.covers(key.report_type(), config));
        if detached > 0 {
            debug!(target = TARGET, detached, scope = scope.label(), "in-flight generations detached");
        }

        let removed = match scope {
            InvalidationScope::All => self.store.clear().await,
            scope => {
                self.store
                    .remove_matching(&|entry: &CachedEntry| scope.matches(entry))
                    .await
            }
        }
        .inspect_err(|err| self.store_failed("invalidate", err))?;

        counter!("bistro_report_cache_invalidated_total", "scope" => scope.label())
            .increment(removed as u64);
        info!(
            target = TARGET,
            scope = scope.label(),
            reports = %scope,
            removed,
            "report cache invalidated"
        );
        Ok(removed)
    }

    /// Remove every entry whose expiry has passed.
    pub async fn cleanup_expired_cache(&self) -> Result<usize, StoreError> {
        let now = OffsetDateTime::now_utc();
        let removed = self
            .store
            .remove_matching(&|entry: &CachedEntry| !entry.is_fresh_at(now))
            .await
            .inspect_err(|err| self.store_failed("cleanup", err))?;
        if removed > 0 {
            info!(target = TARGET, removed, "expired reports removed");
        }
        Ok(removed)
    }

    /// Generate the common report set: every report type over each
    /// configured trailing window ending at today's UTC midnight.
    ///
    /// Reports already cached are skipped. One failure never stops the rest.
    pub async fn preload_common_reports(&self) -> WarmSummary {
        let mut summary = WarmSummary::default();
        let end = today_utc();

        for report_type in ReportType::ALL {
            for &days in &self.config.warm_windows_days {
                let range = match DateRange::last_days(end, days) {
                    Ok(range) => range,
                    Err(err) => {
                        warn!(target = TARGET, days, error = %err, "skipping invalid warm window");
                        summary.failed += 1;
                        continue;
                    }
                };
                let config = ReportConfig::new(range);
                let key = CacheKey::new(report_type, &config);

                if self.fetch_fresh(&key).await.is_some() {
                    summary.skipped += 1;
                    continue;
                }
                let started = Instant::now();
                match self.generate(key, &config).await {
                    Ok((_, outcome)) => {
                        if outcome == CacheOutcome::Generated {
                            self.metrics
                                .record_generation_time(report_type, started.elapsed());
                        }
                        summary.warmed += 1;
                    }
                    Err(err) => {
                        warn!(
                            target = TARGET,
                            report_type = %report_type,
                            days,
                            error = %err,
                            "report warm-up failed"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        info!(
            target = TARGET,
            warmed = summary.warmed,
            skipped = summary.skipped,
            failed = summary.failed,
            "common reports preloaded"
        );
        summary
    }

    pub async fn get_cache_stats(&self) -> Result<CacheStats, StoreError> {
        let entries = self
            .store
            .entries()
            .await
            .inspect_err(|err| self.store_failed("stats", err))?;
        let now = OffsetDateTime::now_utc();

        let mut entries_by_type: BTreeMap<ReportType, usize> =
            ReportType::ALL.into_iter().map(|t| (t, 0)).collect();
        for meta in &entries {
            *entries_by_type.entry(meta.key.report_type()).or_default() += 1;
        }
        gauge!("bistro_report_cache_entries").set(entries.len() as f64);

        Ok(CacheStats {
            total_entries: entries.len(),
            entries_by_type,
            oldest_entry: entries.iter().map(|meta| meta.generated_at).min(),
            newest_entry: entries.iter().map(|meta| meta.generated_at).max(),
            expired_entries: entries.iter().filter(|meta| meta.expires_at <= now).count(),
            inflight_generations: self.inflight.len(),
        })
    }

    async fn fetch_fresh(&self, key: &CacheKey) -> Option<Report> {
        if !self.config.enabled {
            return None;
        }
        let entry = match self.store.get(key).await {
            Ok(entry) => entry?,
            Err(err) => {
                self.store_failed("get", &err);
                return None;
            }
        };

        let now = OffsetDateTime::now_utc();
        if entry.is_fresh_at(now) {
            return Some(entry.report);
        }
        if let Err(err) = self.store.remove_stale(key, now).await {
            self.store_failed("remove_stale", &err);
        }
        None
    }

    async fn generate(
        &self,
        key: CacheKey,
        config: &ReportConfig,
    ) -> Result<(Report, CacheOutcome), GenerationError> {
        let generator = self.generators.get(key.report_type())?;
        let started_epoch = *self.epoch.read().await;
        let job = GenerationJob {
            generator,
            store: self.config.enabled.then(|| Arc::clone(&self.store)),
            key: key.clone(),
            config: config.clone(),
            ttl: self.config.ttl(),
            timeout: self.config.generation_timeout(),
            epoch: Arc::clone(&self.epoch),
            started_epoch,
        };

        if !self.config.single_flight {
            return job.run().await.map(|report| (report, CacheOutcome::Generated));
        }

        let (result, role) = self.inflight.run(&key, config, move || job.boxed()).await;
        let outcome = match role {
            Role::Leader => CacheOutcome::Generated,
            Role::Follower => {
                counter!(
                    "bistro_report_singleflight_joined_total",
                    "report_type" => key.report_type().as_str()
                )
                .increment(1);
                CacheOutcome::Joined
            }
        };
        result.map(|report| (report, outcome))
    }

    fn store_failed(&self, op: &'static str, err: &StoreError) {
        counter!("bistro_report_cache_store_error_total", "op" => op).increment(1);
        warn!(target = TARGET, op, error = %err, "report cache store operation failed");
    }
}

/// Everything a detached generation needs, so it can outlive the caller
/// that started it.
struct GenerationJob {
    generator: Arc<dyn ReportGenerator>,
    store: Option<Arc<dyn ReportStore>>,
    key: CacheKey,
    config: ReportConfig,
    ttl: Duration,
    timeout: Duration,
    epoch: Arc<RwLock<u64>>,
    started_epoch: u64,
}

impl GenerationJob {
    fn boxed(self) -> GenerationFuture {
        self.run().boxed()
    }

    async fn run(self) -> Result<Report, GenerationError> {
        let report_type = self.key.report_type();
        let generation = self.generator.generate(&self.config);
        let report = match tokio::time::timeout(self.timeout, generation).await {
            Ok(result) => result?,
            Err(_) => {
                counter!(
                    "bistro_report_generation_timeout_total",
                    "report_type" => report_type.as_str()
                )
                .increment(1);
                warn!(
                    target = TARGET,
                    key = %self.key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "report generation timed out"
                );
                return Err(GenerationError::Timeout(self.timeout));
            }
        };

        if let Some(store) = &self.store {
            // Held across the write so an invalidation either precedes the
            // check or removes what was written.
            let epoch = self.epoch.read().await;
            if *epoch != self.started_epoch {
                debug!(
                    target = TARGET,
                    key = %self.key,
                    "report invalidated while generating, not cached"
                );
                return Ok(report);
            }
            let entry = CachedEntry::new(
                self.key,
                self.config,
                report.clone(),
                OffsetDateTime::now_utc(),
                self.ttl,
            );
            store_entry(store.as_ref(), entry).await;
        }
        Ok(report)
    }
}

async fn store_entry(store: &dyn ReportStore, entry: CachedEntry) {
    let key = entry.key.clone();
    match store.put(entry).await {
        Ok(Some(evicted)) => {
            debug!(target = TARGET, key = %key, evicted = %evicted, "report cached with eviction");
        }
        Ok(None) => debug!(target = TARGET, key = %key, "report cached"),
        Err(err) => {
            counter!("bistro_report_cache_store_error_total", "op" => "put").increment(1);
            warn!(target = TARGET, key = %key, error = %err, "failed to cache report");
        }
    }
}
