//! Report windows, report configuration, and the opaque report payload.

use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use time::{Duration, OffsetDateTime, UtcOffset};

use super::error::DomainError;

/// A window of instants. Containment and intersection are inclusive at both ends.
///
/// Invariant: `from < to`. Both bounds are normalised to UTC so equal instants
/// compare, hash, and fingerprint identically regardless of the offset they were
/// supplied with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    #[serde(with = "time::serde::rfc3339")]
    from: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    to: OffsetDateTime,
}

impl DateRange {
    pub fn new(from: OffsetDateTime, to: OffsetDateTime) -> Result<Self, DomainError> {
        if from >= to {
            return Err(DomainError::date_range("`from` must be earlier than `to`"));
        }
        Ok(Self {
            from: from.to_offset(UtcOffset::UTC),
            to: to.to_offset(UtcOffset::UTC),
        })
    }

    /// Window of `days` days ending at `end`.
    pub fn last_days(end: OffsetDateTime, days: u32) -> Result<Self, DomainError> {
        Self::new(end - Duration::days(i64::from(days)), end)
    }

    pub fn from(&self) -> OffsetDateTime {
        self.from
    }

    pub fn to(&self) -> OffsetDateTime {
        self.to
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.from <= instant && instant <= self.to
    }

    pub fn intersects(&self, other: &DateRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }
}

/// Everything that determines the content of a generated report.
///
/// Two configs with equal fields must yield identical reports; the cache key is
/// derived from every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportConfig {
    pub date_range: DateRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_period: Option<DateRange>,
    pub timezone: Tz,
    pub include_projections: bool,
}

impl ReportConfig {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            comparison_period: None,
            timezone: Tz::UTC,
            include_projections: false,
        }
    }

    pub fn with_comparison(mut self, period: DateRange) -> Self {
        self.comparison_period = Some(period);
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_projections(mut self, include: bool) -> Self {
        self.include_projections = include;
        self
    }

    /// True when `instant` falls inside the primary or the comparison window.
    pub fn covers(&self, instant: OffsetDateTime) -> bool {
        self.date_range.contains(instant)
            || self
                .comparison_period
                .is_some_and(|period| period.contains(instant))
    }

    /// True when `range` intersects the primary or the comparison window.
    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.date_range.intersects(range)
            || self
                .comparison_period
                .is_some_and(|period| period.intersects(range))
    }
}

/// Generator output. Immutable once produced; clones share the same payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report(Arc<serde_json::Value>);

impl Report {
    pub fn new(payload: serde_json::Value) -> Self {
        Self(Arc::new(payload))
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.0
    }

    /// Whether both handles point at the very same stored payload.
    pub fn shares_payload(&self, other: &Report) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<serde_json::Value> for Report {
    fn from(payload: serde_json::Value) -> Self {
        Self::new(payload)
    }
}
