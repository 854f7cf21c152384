//! Conversion of wire bodies into domain values.
//!
//! Shape problems (missing fields, unparseable values) are collected as
//! [`ValidationIssue`]s. A well-formed window whose `from` is not before `to`
//! is reported separately as a date-range error.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bistro_api_types::{
    CacheActionRequest, DateRangeBody, ExportResult, ReportQuery, ReportRequestBody,
    SmartInvalidationRequest, ValidationIssue,
};
use chrono_tz::Tz;
use time::OffsetDateTime;

use crate::application::export::{ExportFormat, ExportOptions};
use crate::application::reports::ExportOutcome;
use crate::cache::InvalidationEvent;
use crate::domain::error::DomainError;
use crate::domain::reports::{DateRange, ReportConfig};
use crate::domain::types::{DataType, ReportType};
use crate::util::timezone::{parse_instant, parse_timezone};

use super::error::ApiError;

#[derive(Debug)]
pub enum RequestError {
    Invalid(Vec<ValidationIssue>),
    DateRange(String),
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Invalid(details) => ApiError::invalid_parameters(details),
            RequestError::DateRange(detail) => ApiError::invalid_date_range(detail),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportParams {
    pub config: ReportConfig,
    pub export: Option<ExportOptions>,
}

#[derive(Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(ValidationIssue::new(field, message));
    }

    fn required<'a>(&mut self, field: &str, value: Option<&'a str>) -> Option<&'a str> {
        match value.map(str::trim) {
            Some(value) if !value.is_empty() => Some(value),
            _ => {
                self.push(field, "is required");
                None
            }
        }
    }

    fn check<T>(&mut self, field: &str, result: Result<T, DomainError>) -> Option<T> {
        result.map_err(|err| self.push(field, err.to_string())).ok()
    }

    fn flag(&mut self, field: &str, raw: Option<&str>) -> bool {
        match raw.map(str::trim) {
            None | Some("false") => false,
            Some("true") => true,
            Some(other) => {
                self.push(field, format!("expected `true` or `false`, got `{other}`"));
                false
            }
        }
    }

    fn finish(self) -> Result<(), RequestError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(RequestError::Invalid(self.0))
        }
    }
}

/// Wire names of the report parameters, so issues point at what the client sent.
struct Fields {
    from: &'static str,
    to: &'static str,
    compare_from: &'static str,
    compare_to: &'static str,
    timezone: &'static str,
    export: &'static str,
}

const QUERY_FIELDS: Fields = Fields {
    from: "dateFrom",
    to: "dateTo",
    compare_from: "compareFrom",
    compare_to: "compareTo",
    timezone: "timezone",
    export: "export",
};

const BODY_FIELDS: Fields = Fields {
    from: "config.dateRange.from",
    to: "config.dateRange.to",
    compare_from: "config.comparisonPeriod.from",
    compare_to: "config.comparisonPeriod.to",
    timezone: "config.timezone",
    export: "export.format",
};

struct RawExport<'a> {
    format: &'a str,
    include_charts: bool,
    include_raw_data: bool,
}

struct RawParams<'a> {
    from: Option<&'a str>,
    to: Option<&'a str>,
    compare: Option<(&'a str, &'a str)>,
    timezone: Option<&'a str>,
    include_projections: bool,
    export: Option<RawExport<'a>>,
}

pub fn report_from_query(query: &ReportQuery) -> Result<ReportParams, RequestError> {
    let mut issues = Issues::default();

    let compare = match (query.compare_from.as_deref(), query.compare_to.as_deref()) {
        (Some(from), Some(to)) => Some((from, to)),
        (None, None) => None,
        (Some(_), None) => {
            issues.push("compareTo", "compareFrom and compareTo must be provided together");
            None
        }
        (None, Some(_)) => {
            issues.push("compareFrom", "compareFrom and compareTo must be provided together");
            None
        }
    };
    let include_projections =
        issues.flag("includeProjections", query.include_projections.as_deref());
    let include_charts = issues.flag("includeCharts", query.include_charts.as_deref());
    let include_raw_data = issues.flag("includeRawData", query.include_raw_data.as_deref());

    let raw = RawParams {
        from: query.date_from.as_deref(),
        to: query.date_to.as_deref(),
        compare,
        timezone: query.timezone.as_deref(),
        include_projections,
        export: query.export.as_deref().map(|format| RawExport {
            format,
            include_charts,
            include_raw_data,
        }),
    };
    build_params(raw, &QUERY_FIELDS, issues)
}

pub fn report_from_body(body: &ReportRequestBody) -> Result<ReportParams, RequestError> {
    let config = &body.config;
    let raw = RawParams {
        from: Some(config.date_range.from.as_str()),
        to: Some(config.date_range.to.as_str()),
        compare: config
            .comparison_period
            .as_ref()
            .map(|period| (period.from.as_str(), period.to.as_str())),
        timezone: config.timezone.as_deref(),
        include_projections: config.include_projections.unwrap_or(false),
        export: body.export.as_ref().map(|export| RawExport {
            format: export.format.as_str(),
            include_charts: export.include_charts,
            include_raw_data: export.include_raw_data,
        }),
    };
    build_params(raw, &BODY_FIELDS, Issues::default())
}

fn build_params(
    raw: RawParams<'_>,
    fields: &Fields,
    mut issues: Issues,
) -> Result<ReportParams, RequestError> {
    let timezone = match raw.timezone {
        Some(name) => issues
            .check(fields.timezone, parse_timezone(name))
            .unwrap_or(Tz::UTC),
        None => Tz::UTC,
    };

    let from = issues
        .required(fields.from, raw.from)
        .and_then(|value| issues.check(fields.from, parse_instant(value, timezone)));
    let to = issues
        .required(fields.to, raw.to)
        .and_then(|value| issues.check(fields.to, parse_instant(value, timezone)));
    let compare = raw.compare.map(|(from, to)| {
        (
            issues.check(fields.compare_from, parse_instant(from, timezone)),
            issues.check(fields.compare_to, parse_instant(to, timezone)),
        )
    });
    let export = raw.export.and_then(|export| {
        let format = issues.check(fields.export, export.format.trim().parse::<ExportFormat>())?;
        Some(ExportOptions {
            format,
            include_charts: export.include_charts,
            include_raw_data: export.include_raw_data,
        })
    });

    let (Some(from), Some(to)) = (from, to) else {
        return Err(RequestError::Invalid(issues.0));
    };
    issues.finish()?;

    let date_range = DateRange::new(from, to).map_err(date_range_error)?;
    let comparison = match compare {
        Some((Some(from), Some(to))) => Some(DateRange::new(from, to).map_err(date_range_error)?),
        _ => None,
    };

    let mut config = ReportConfig::new(date_range)
        .with_timezone(timezone)
        .with_projections(raw.include_projections);
    if let Some(period) = comparison {
        config = config.with_comparison(period);
    }
    Ok(ReportParams { config, export })
}

fn date_range_error(err: DomainError) -> RequestError {
    RequestError::DateRange(err.to_string())
}

/// Target of the admin `invalidate` action: a report type, a date, or neither.
pub fn invalidation_target(
    request: &CacheActionRequest,
) -> Result<(Option<ReportType>, Option<OffsetDateTime>), ApiError> {
    let report_type = request
        .report_type
        .as_deref()
        .map(|raw| {
            raw.parse::<ReportType>()
                .map_err(|_| ApiError::invalid_report_type(raw))
        })
        .transpose()?;

    let mut issues = Issues::default();
    let date = request
        .date
        .as_deref()
        .and_then(|raw| issues.check("date", parse_instant(raw, Tz::UTC)));
    issues.finish()?;

    Ok((report_type, date))
}

pub fn invalidation_event(
    request: &SmartInvalidationRequest,
) -> Result<InvalidationEvent, RequestError> {
    let mut issues = Issues::default();

    let data_type = issues
        .required("dataType", request.data_type.as_deref())
        .and_then(|raw| issues.check("dataType", raw.parse::<DataType>()));
    let timestamp = issues
        .required("timestamp", request.timestamp.as_deref())
        .and_then(|raw| issues.check("timestamp", parse_instant(raw, Tz::UTC)));
    let affected = request
        .affected_date_range
        .as_ref()
        .map(|range| parse_range(&mut issues, "affectedDateRange", range));

    let (Some(data_type), Some(timestamp)) = (data_type, timestamp) else {
        return Err(RequestError::Invalid(issues.0));
    };
    issues.finish()?;

    let event = InvalidationEvent::new(data_type, timestamp);
    match affected {
        Some((Some(from), Some(to))) => {
            let range = DateRange::new(from, to).map_err(date_range_error)?;
            Ok(event.with_affected_range(range))
        }
        _ => Ok(event),
    }
}

fn parse_range(
    issues: &mut Issues,
    field: &str,
    range: &DateRangeBody,
) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
    (
        issues.check(&format!("{field}.from"), parse_instant(&range.from, Tz::UTC)),
        issues.check(&format!("{field}.to"), parse_instant(&range.to, Tz::UTC)),
    )
}

/// The `export` member of a report response.
pub fn export_result(outcome: ExportOutcome) -> ExportResult {
    match outcome {
        ExportOutcome::Completed(artifact) => ExportResult {
            success: true,
            format: artifact.format.to_string(),
            filename: Some(artifact.filename),
            content_type: Some(artifact.content_type.to_string()),
            size_bytes: Some(artifact.bytes.len()),
            data: Some(STANDARD.encode(&artifact.bytes)),
            error: None,
        },
        ExportOutcome::Failed { format, message } => ExportResult {
            success: false,
            format: format.to_string(),
            filename: None,
            content_type: None,
            size_bytes: None,
            data: None,
            error: Some(message),
        },
    }
}

#[cfg(test)]
mod tests {
    use bistro_api_types::{ExportOptionsBody, ReportConfigBody};
    use time::macros::datetime;

    use super::*;
    use crate::application::export::ExportArtifact;

    fn query(from: &str, to: &str) -> ReportQuery {
        ReportQuery {
            date_from: Some(from.to_string()),
            date_to: Some(to.to_string()),
            ..ReportQuery::default()
        }
    }

    fn issues_of(err: RequestError) -> Vec<ValidationIssue> {
        match err {
            RequestError::Invalid(issues) => issues,
            RequestError::DateRange(detail) => panic!("unexpected date range error: {detail}"),
        }
    }

    #[test]
    fn query_defaults_to_utc_without_projections() {
        let params = report_from_query(&query("2024-01-01", "2024-01-31")).expect("params");
        assert_eq!(params.config.timezone, Tz::UTC);
        assert!(!params.config.include_projections);
        assert!(params.config.comparison_period.is_none());
        assert!(params.export.is_none());
        assert_eq!(params.config.date_range.from(), datetime!(2024-01-01 0:00 UTC));
    }

    #[test]
    fn query_dates_follow_timezone() {
        let mut q = query("2024-01-01", "2024-01-31");
        q.timezone = Some("America/New_York".to_string());
        let params = report_from_query(&q).expect("params");
        assert_eq!(params.config.date_range.from(), datetime!(2024-01-01 5:00 UTC));
    }

    #[test]
    fn reversed_window_is_a_date_range_error() {
        let err = report_from_query(&query("2024-01-10", "2024-01-05")).expect_err("reversed");
        assert!(matches!(err, RequestError::DateRange(ref detail) if detail.contains("date range")));
    }

    #[test]
    fn shape_issues_are_collected_together() {
        let q = ReportQuery {
            date_to: Some("not-a-date".to_string()),
            compare_from: Some("2023-12-01".to_string()),
            include_projections: Some("yes".to_string()),
            timezone: Some("Mars/Olympus".to_string()),
            ..ReportQuery::default()
        };
        let fields: Vec<String> = issues_of(report_from_query(&q).expect_err("invalid"))
            .into_iter()
            .map(|issue| issue.field)
            .collect();
        for expected in ["dateFrom", "dateTo", "compareTo", "includeProjections", "timezone"] {
            assert!(fields.iter().any(|f| f == expected), "missing issue for {expected}");
        }
    }

    #[test]
    fn query_export_options_are_parsed() {
        let mut q = query("2024-01-01", "2024-01-31");
        q.export = Some("csv".to_string());
        q.include_raw_data = Some("true".to_string());
        let export = report_from_query(&q).expect("params").export.expect("export");
        assert_eq!(export.format, ExportFormat::Csv);
        assert!(export.include_raw_data);
        assert!(!export.include_charts);

        q.export = Some("docx".to_string());
        let issues = issues_of(report_from_query(&q).expect_err("bad format"));
        assert_eq!(issues[0].field, "export");
    }

    #[test]
    fn body_with_comparison_builds_config() {
        let body = ReportRequestBody {
            config: ReportConfigBody {
                date_range: DateRangeBody {
                    from: "2024-02-01".to_string(),
                    to: "2024-02-29".to_string(),
                },
                comparison_period: Some(DateRangeBody {
                    from: "2024-01-01".to_string(),
                    to: "2024-01-31".to_string(),
                }),
                timezone: None,
                include_projections: Some(true),
            },
            export: Some(ExportOptionsBody {
                format: "pdf".to_string(),
                include_charts: true,
                include_raw_data: false,
            }),
        };
        let params = report_from_body(&body).expect("params");
        assert!(params.config.include_projections);
        assert_eq!(
            params.config.comparison_period.expect("comparison").from(),
            datetime!(2024-01-01 0:00 UTC)
        );
        assert_eq!(params.export.expect("export").format, ExportFormat::Pdf);
    }

    #[test]
    fn invalidation_target_validates_fields() {
        let request = CacheActionRequest {
            action: "invalidate".to_string(),
            report_type: Some("sales-summary".to_string()),
            date: Some("2024-01-03".to_string()),
            data_type: None,
        };
        let (report_type, date) = invalidation_target(&request).expect("target");
        assert_eq!(report_type, Some(ReportType::SalesSummary));
        assert_eq!(date, Some(datetime!(2024-01-03 0:00 UTC)));

        let bad = CacheActionRequest {
            report_type: Some("weekly".to_string()),
            ..request
        };
        assert!(invalidation_target(&bad).is_err());
    }

    #[test]
    fn smart_invalidation_requires_data_type_and_timestamp() {
        let fields: Vec<String> =
            issues_of(invalidation_event(&SmartInvalidationRequest::default()).expect_err("empty"))
                .into_iter()
                .map(|issue| issue.field)
                .collect();
        assert_eq!(fields, vec!["dataType", "timestamp"]);
    }

    #[test]
    fn smart_invalidation_event_with_range() {
        let request = SmartInvalidationRequest {
            data_type: Some("menu".to_string()),
            timestamp: Some("2024-01-15T10:00:00Z".to_string()),
            affected_date_range: Some(DateRangeBody {
                from: "2024-01-14".to_string(),
                to: "2024-01-16".to_string(),
            }),
        };
        let event = invalidation_event(&request).expect("event");
        assert_eq!(event.data_type, DataType::Menu);
        assert_eq!(
            event.affected_range.expect("range").to(),
            datetime!(2024-01-16 0:00 UTC)
        );
    }

    #[test]
    fn failed_export_carries_message() {
        let failed = export_result(ExportOutcome::Failed {
            format: ExportFormat::Excel,
            message: "unsupported export format `excel`".to_string(),
        });
        assert!(!failed.success);
        assert_eq!(failed.format, "excel");

        let done = export_result(ExportOutcome::Completed(ExportArtifact {
            format: ExportFormat::Csv,
            filename: "sales-summary.csv".to_string(),
            content_type: "text/csv; charset=utf-8",
            bytes: b"field,value\n".to_vec(),
        }));
        assert_eq!(done.data.as_deref(), Some("ZmllbGQsdmFsdWUK"));
        assert_eq!(done.size_bytes, Some(12));
    }
}
