#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use bistro::application::error::ErrorDetailPolicy;
use bistro::application::export::{
    CsvExporter, ExportArtifact, ExportError, ExportOptions, Exporter,
};
use bistro::application::reports::{GenerationError, ReportGenerator, ReportGenerators};
use bistro::cache::{CacheConfig, CacheMetrics, MemoryReportStore, ReportCache};
use bistro::domain::reports::{Report, ReportConfig};
use bistro::domain::types::ReportType;
use bistro::infra::http::{ApiState, build_api_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Generator that counts calls and can be told to stall or fail.
#[derive(Default)]
pub struct CountingGenerator {
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
    pub failure: Option<String>,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReportGenerator for CountingGenerator {
    async fn generate(&self, config: &ReportConfig) -> Result<Report, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay.unwrap_or(Duration::from_millis(2))).await;
        if let Some(message) = &self.failure {
            return Err(GenerationError::failed(message.clone()));
        }
        Ok(Report::new(json!({
            "call": call,
            "from": config.date_range.from().unix_timestamp(),
            "rows": [{ "item": "soup", "sold": 12 }],
        })))
    }
}

pub struct BrokenExporter;

#[async_trait]
impl Exporter for BrokenExporter {
    async fn export(
        &self,
        _report_type: ReportType,
        _report: &Report,
        _options: &ExportOptions,
    ) -> Result<ExportArtifact, ExportError> {
        Err(ExportError::Failed("renderer offline".to_string()))
    }
}

pub struct Harness {
    pub router: Router,
    pub cache: Arc<ReportCache>,
    pub metrics: Arc<CacheMetrics>,
}

pub struct HarnessBuilder {
    config: CacheConfig,
    generators: ReportGenerators,
    exporter: Arc<dyn Exporter>,
    errors: ErrorDetailPolicy,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: CacheConfig::default(),
            generators: ReportGenerators::builtin(),
            exporter: Arc::new(CsvExporter),
            errors: ErrorDetailPolicy::detailed(),
        }
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn generator(mut self, report_type: ReportType, generator: Arc<dyn ReportGenerator>) -> Self {
        self.generators = self.generators.register(report_type, generator);
        self
    }

    pub fn exporter(mut self, exporter: Arc<dyn Exporter>) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn errors(mut self, errors: ErrorDetailPolicy) -> Self {
        self.errors = errors;
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(MemoryReportStore::new(&self.config));
        let metrics = Arc::new(CacheMetrics::new());
        let cache = Arc::new(ReportCache::new(
            self.config,
            store,
            Arc::new(self.generators),
            metrics.clone(),
        ));
        let state = ApiState::from_cache(cache.clone(), self.exporter, self.errors);
        Harness {
            router: build_api_router(state),
            cache,
            metrics,
        }
    }
}

impl Harness {
    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(body)).await
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should collect")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be json")
        };
        (status, value)
    }
}

pub const WEEK_QUERY: &str = "dateFrom=2024-01-01&dateTo=2024-01-08";

pub fn report_uri(report_type: &str) -> String {
    format!("/api/reports/{report_type}?{WEEK_QUERY}")
}
