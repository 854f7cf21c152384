//! Invalidation planning.
//!
//! Turns an admin request or an [`InvalidationEvent`] into an
//! [`InvalidationScope`], a predicate over cached entries. Applying the same
//! scope twice removes nothing the second time.

use std::collections::BTreeSet;
use std::fmt;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::domain::reports::{DateRange, ReportConfig};
use crate::domain::types::ReportType;

use super::deps::dependents;
use super::events::InvalidationEvent;
use super::store::CachedEntry;

/// The set of cached entries an invalidation drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Every entry.
    All,
    /// Every entry of one report type, regardless of freshness.
    ReportType(ReportType),
    /// Every entry whose primary or comparison window contains the instant.
    Date(OffsetDateTime),
    /// Entries of the listed types, optionally only those overlapping `window`.
    Dependents {
        report_types: BTreeSet<ReportType>,
        window: Option<DateRange>,
    },
}

impl InvalidationScope {
    /// Scope for the admin `invalidate` action.
    ///
    /// Precedence is report type, then date, then everything: a request naming
    /// both a report type and a date invalidates the whole report type.
    pub fn for_admin(report_type: Option<ReportType>, date: Option<OffsetDateTime>) -> Self {
        match (report_type, date) {
            (Some(report_type), _) => Self::ReportType(report_type),
            (None, Some(date)) => Self::Date(date),
            (None, None) => Self::All,
        }
    }

    /// Scope for a data-mutation event, driven by the dependency table.
    pub fn for_event(event: &InvalidationEvent) -> Self {
        Self::Dependents {
            report_types: dependents(event.data_type).iter().copied().collect(),
            window: event.affected_range,
        }
    }

    pub fn matches(&self, entry: &CachedEntry) -> bool {
        self.covers(entry.report_type(), &entry.config)
    }

    /// Whether a report of `report_type` built from `config` falls in scope.
    pub fn covers(&self, report_type: ReportType, config: &ReportConfig) -> bool {
        match self {
            Self::All => true,
            Self::ReportType(scoped) => report_type == *scoped,
            Self::Date(date) => config.covers(*date),
            Self::Dependents {
                report_types,
                window,
            } => {
                report_types.contains(&report_type)
                    && window.is_none_or(|window| config.overlaps(&window))
            }
        }
    }

    /// Short tag used in logs and admin responses.
    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::ReportType(_) => "report-type",
            Self::Date(_) => "date",
            Self::Dependents { window: None, .. } => "dependents",
            Self::Dependents {
                window: Some(_), ..
            } => "dependents-in-range",
        }
    }
}

impl fmt::Display for InvalidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all reports"),
            Self::ReportType(report_type) => write!(f, "{report_type}"),
            Self::Date(date) => {
                let date = date.format(&Rfc3339).unwrap_or_else(|_| date.to_string());
                write!(f, "reports covering {date}")
            }
            Self::Dependents { report_types, .. } => {
                let names: Vec<&str> = report_types.iter().map(|t| t.as_str()).collect();
                write!(f, "{}", names.join(", "))
            }
        }
    }
}
