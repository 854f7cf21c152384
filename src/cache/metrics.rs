//! Generation cost and cache effectiveness.
//!
//! Recording is append-only and infallible; it never delays the report it
//! describes. Samples are also mirrored to the `metrics` facade.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use metrics::{counter, histogram};
use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::ReportType;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::metrics";
const DEFAULT_SAMPLE_CAPACITY: usize = 10_000;

/// One report generation (cache miss).
#[derive(Debug, Clone)]
pub struct MetricsSample {
    pub report_type: ReportType,
    pub generation_ms: f64,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStats {
    pub count: usize,
    pub avg_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95_ms: Option<f64>,
}

impl GenerationStats {
    fn from_durations(mut values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(f64::total_cmp);
        let count = values.len();
        let avg_ms = values.iter().sum::<f64>() / count as f64;
        // Nearest-rank percentile.
        let rank = ((count as f64) * 0.95).ceil() as usize;
        let p95_ms = values.get(rank.saturating_sub(1)).copied();
        Self {
            count,
            avg_ms,
            p95_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub by_report_type: BTreeMap<ReportType, GenerationStats>,
    pub overall: GenerationStats,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

/// In-process metrics store backing the admin `stats` action.
pub struct CacheMetrics {
    samples: Mutex<VecDeque<MetricsSample>>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY)
    }

    /// Keep at most `capacity` samples; the oldest are dropped first.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn record_generation_time(&self, report_type: ReportType, elapsed: Duration) {
        let generation_ms = elapsed.as_secs_f64() * 1000.0;
        histogram!("bistro_report_generation_ms", "report_type" => report_type.as_str())
            .record(generation_ms);

        let mut samples = mutex_lock(&self.samples, SOURCE, "record_generation_time");
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(MetricsSample {
            report_type,
            generation_ms,
            timestamp: OffsetDateTime::now_utc(),
        });
    }

    pub fn record_hit(&self, report_type: ReportType) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("bistro_report_cache_hit_total", "report_type" => report_type.as_str())
            .increment(1);
    }

    pub fn record_miss(&self, report_type: ReportType) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("bistro_report_cache_miss_total", "report_type" => report_type.as_str())
            .increment(1);
    }

    /// Recorded samples, oldest first.
    pub fn samples(&self) -> Vec<MetricsSample> {
        mutex_lock(&self.samples, SOURCE, "samples")
            .iter()
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> MetricsSummary {
        let samples = self.samples();

        let mut grouped: BTreeMap<ReportType, Vec<f64>> = BTreeMap::new();
        for sample in &samples {
            grouped
                .entry(sample.report_type)
                .or_default()
                .push(sample.generation_ms);
        }

        let by_report_type = grouped
            .into_iter()
            .map(|(report_type, values)| (report_type, GenerationStats::from_durations(values)))
            .collect();
        let overall =
            GenerationStats::from_durations(samples.iter().map(|s| s.generation_ms).collect());

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        MetricsSummary {
            by_report_type,
            overall,
            hits,
            misses,
            hit_rate,
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
