use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::application::export::{ExportArtifact, ExportFormat, ExportOptions, Exporter};
use crate::application::generators::BaselineGenerator;
use crate::cache::{CacheOutcome, ReportCache};
use crate::domain::reports::{Report, ReportConfig};
use crate::domain::types::ReportType;

/// Failure to produce a report. Cloned to every caller waiting on the same
/// generation.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("no generator registered for `{0}`")]
    Unavailable(ReportType),
    #[error("report generation timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("report generator failed: {0}")]
    Failed(String),
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Produces the payload for one report type. Must be deterministic for a
/// given config.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, config: &ReportConfig) -> Result<Report, GenerationError>;
}

/// Generator lookup by report type.
#[derive(Clone, Default)]
pub struct ReportGenerators {
    generators: HashMap<ReportType, Arc<dyn ReportGenerator>>,
}

impl ReportGenerators {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator for every report type backed by [`BaselineGenerator`].
    pub fn builtin() -> Self {
        ReportType::ALL
            .into_iter()
            .fold(Self::new(), |registry, report_type| {
                registry.register(report_type, Arc::new(BaselineGenerator::new(report_type)))
            })
    }

    pub fn register(mut self, report_type: ReportType, generator: Arc<dyn ReportGenerator>) -> Self {
        self.generators.insert(report_type, generator);
        self
    }

    pub fn get(&self, report_type: ReportType) -> Result<Arc<dyn ReportGenerator>, GenerationError> {
        self.generators
            .get(&report_type)
            .cloned()
            .ok_or(GenerationError::Unavailable(report_type))
    }
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub report_type: ReportType,
    pub config: ReportConfig,
    pub export: Option<ExportOptions>,
}

#[derive(Debug, Clone)]
pub enum ExportOutcome {
    Completed(ExportArtifact),
    Failed { format: ExportFormat, message: String },
}

#[derive(Debug, Clone)]
pub struct ReportRun {
    pub report: Report,
    pub outcome: CacheOutcome,
    pub export: Option<ExportOutcome>,
    pub elapsed: Duration,
}

impl ReportRun {
    pub fn cached(&self) -> bool {
        self.outcome == CacheOutcome::Hit
    }
}

/// Serves reports through the cache and attaches exports.
#[derive(Clone)]
pub struct ReportService {
    cache: Arc<ReportCache>,
    exporter: Arc<dyn Exporter>,
}

impl ReportService {
    pub fn new(cache: Arc<ReportCache>, exporter: Arc<dyn Exporter>) -> Self {
        Self { cache, exporter }
    }

    /// Look up or generate the report, then export it if asked.
    ///
    /// `started` marks the beginning of the request; generation cost is
    /// measured from it and recorded only when this call ran the generator.
    /// Export failures never fail the run.
    pub async fn run(
        &self,
        request: ReportRequest,
        started: Instant,
    ) -> Result<ReportRun, GenerationError> {
        let ReportRequest {
            report_type,
            config,
            export,
        } = request;

        let (report, outcome) = self.cache.get_or_generate(report_type, &config).await?;
        if outcome == CacheOutcome::Generated {
            self.cache
                .metrics()
                .record_generation_time(report_type, started.elapsed());
        }

        let export = match export {
            Some(options) => Some(self.export(report_type, &report, &options).await),
            None => None,
        };

        Ok(ReportRun {
            report,
            outcome,
            export,
            elapsed: started.elapsed(),
        })
    }

    async fn export(
        &self,
        report_type: ReportType,
        report: &Report,
        options: &ExportOptions,
    ) -> ExportOutcome {
        match self.exporter.export(report_type, report, options).await {
            Ok(artifact) => ExportOutcome::Completed(artifact),
            Err(err) => {
                warn!(
                    target = "bistro::application::reports",
                    report_type = %report_type,
                    format = %options.format,
                    error = %err,
                    "Report export failed"
                );
                ExportOutcome::Failed {
                    format: options.format,
                    message: err.to_string(),
                }
            }
        }
    }
}
