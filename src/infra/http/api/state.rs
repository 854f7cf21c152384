use std::sync::Arc;

use crate::application::cache_admin::CacheAdminService;
use crate::application::error::ErrorDetailPolicy;
use crate::application::export::Exporter;
use crate::application::reports::{ReportGenerators, ReportService};
use crate::cache::{CacheConfig, CacheMetrics, ReportCache, ReportStore};

#[derive(Clone)]
pub struct ApiState {
    pub reports: Arc<ReportService>,
    pub cache_admin: Arc<CacheAdminService>,
    pub errors: ErrorDetailPolicy,
}

impl ApiState {
    /// Wire the report services around one shared cache.
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn ReportStore>,
        generators: ReportGenerators,
        exporter: Arc<dyn Exporter>,
        errors: ErrorDetailPolicy,
    ) -> Self {
        let cache = Arc::new(ReportCache::new(
            config,
            store,
            Arc::new(generators),
            Arc::new(CacheMetrics::new()),
        ));
        Self::from_cache(cache, exporter, errors)
    }

    pub fn from_cache(
        cache: Arc<ReportCache>,
        exporter: Arc<dyn Exporter>,
        errors: ErrorDetailPolicy,
    ) -> Self {
        Self {
            reports: Arc::new(ReportService::new(cache.clone(), exporter)),
            cache_admin: Arc::new(CacheAdminService::new(cache)),
            errors,
        }
    }
}
