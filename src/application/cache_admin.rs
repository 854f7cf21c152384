use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;

use crate::cache::{
    CacheMetrics, CacheStats, InvalidationEvent, InvalidationScope, MetricsSummary, ReportCache,
    StoreError,
};
use crate::domain::types::ReportType;

/// Cache stats merged with the generation metrics summary.
#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub cache: CacheStats,
    pub metrics: MetricsSummary,
}

/// Operator actions on the report cache.
#[derive(Clone)]
pub struct CacheAdminService {
    cache: Arc<ReportCache>,
}

impl CacheAdminService {
    pub fn new(cache: Arc<ReportCache>) -> Self {
        Self { cache }
    }

    /// Invalidate by report type, else by date, else everything.
    pub async fn invalidate(
        &self,
        report_type: Option<ReportType>,
        date: Option<OffsetDateTime>,
    ) -> Result<(InvalidationScope, usize), StoreError> {
        let scope = InvalidationScope::for_admin(report_type, date);
        let removed = self.cache.invalidate(&scope).await?;
        Ok((scope, removed))
    }

    /// Start warming the common report set in the background.
    pub fn warm(&self) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            let summary = cache.preload_common_reports().await;
            info!(
                target = "bistro::application::cache_admin",
                warmed = summary.warmed,
                failed = summary.failed,
                "background warm-up finished"
            );
        });
    }

    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        self.cache.cleanup_expired_cache().await
    }

    pub async fn stats(&self) -> Result<AdminStats, StoreError> {
        let cache = self.cache.get_cache_stats().await?;
        Ok(AdminStats {
            cache,
            metrics: self.metrics().summary(),
        })
    }

    pub async fn smart_invalidate(&self, event: &InvalidationEvent) -> Result<usize, StoreError> {
        self.cache.smart_invalidation(event).await
    }

    fn metrics(&self) -> &CacheMetrics {
        self.cache.metrics()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use time::macros::datetime;

    use super::*;
    use crate::application::export::CsvExporter;
    use crate::application::reports::{ReportGenerators, ReportRequest, ReportService};
    use crate::cache::{CacheConfig, MemoryReportStore};
    use crate::domain::reports::{DateRange, ReportConfig};

    fn fixture() -> (CacheAdminService, ReportService) {
        let config = CacheConfig::default();
        let cache = Arc::new(ReportCache::new(
            config.clone(),
            Arc::new(MemoryReportStore::new(&config)),
            Arc::new(ReportGenerators::builtin()),
            Arc::new(CacheMetrics::new()),
        ));
        (
            CacheAdminService::new(cache.clone()),
            ReportService::new(cache, Arc::new(CsvExporter)),
        )
    }

    async fn run(service: &ReportService, report_type: ReportType) {
        let config = ReportConfig::new(
            DateRange::new(datetime!(2024-01-01 0:00 UTC), datetime!(2024-01-31 0:00 UTC))
                .expect("valid range"),
        );
        service
            .run(
                ReportRequest {
                    report_type,
                    config,
                    export: None,
                },
                Instant::now(),
            )
            .await
            .expect("report");
    }

    #[tokio::test]
    async fn report_type_takes_precedence_over_date() {
        let (admin, reports) = fixture();
        run(&reports, ReportType::SalesSummary).await;
        run(&reports, ReportType::LaborAnalysis).await;

        let (scope, removed) = admin
            .invalidate(
                Some(ReportType::SalesSummary),
                Some(datetime!(2024-01-10 0:00 UTC)),
            )
            .await
            .expect("invalidate");

        assert_eq!(scope, InvalidationScope::ReportType(ReportType::SalesSummary));
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn stats_merge_cache_and_metrics() {
        let (admin, reports) = fixture();
        run(&reports, ReportType::SalesSummary).await;
        run(&reports, ReportType::SalesSummary).await;

        let stats = admin.stats().await.expect("stats");
        assert_eq!(stats.cache.total_entries, 1);
        assert_eq!(stats.metrics.by_report_type[&ReportType::SalesSummary].count, 1);
        assert_eq!(stats.metrics.hits, 1);

        let json = serde_json::to_value(&stats).expect("serialize");
        assert_eq!(json["metrics"]["byReportType"]["sales-summary"]["count"], 1);
        assert_eq!(json["cache"]["entriesByType"]["sales-summary"], 1);
    }

    #[tokio::test]
    async fn warm_runs_in_background() {
        let (admin, _) = fixture();
        admin.warm();

        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let stats = admin.stats().await.expect("stats");
            if stats.cache.total_entries == 10 {
                break;
            }
            assert!(Instant::now() < deadline, "warm-up did not finish");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
